//! uid/gid → name resolution, with numeric fallback for unknown ids.
//!
//! Grounded on `conserve::owner::unix`: a lazily-initialized, mutex-guarded
//! cache in front of the platform's user/group database.

use std::sync::Mutex;

use lazy_static::lazy_static;

#[cfg(unix)]
lazy_static! {
    static ref USERS_CACHE: Mutex<uzers::cache::UsersCache> = Mutex::new(uzers::cache::UsersCache::new());
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
    pub user: String,
    pub group: String,
}

#[cfg(unix)]
pub fn lookup(uid: u32, gid: u32) -> Owner {
    use uzers::{Groups, Users};
    let cache = USERS_CACHE.lock().unwrap();
    let user = cache
        .get_user_by_uid(uid)
        .and_then(|u| u.name().to_str().map(str::to_owned))
        .unwrap_or_else(|| uid.to_string());
    let group = cache
        .get_group_by_gid(gid)
        .and_then(|g| g.name().to_str().map(str::to_owned))
        .unwrap_or_else(|| gid.to_string());
    Owner {
        uid,
        gid,
        user,
        group,
    }
}

#[cfg(not(unix))]
pub fn lookup(uid: u32, gid: u32) -> Owner {
    Owner {
        uid,
        gid,
        user: uid.to_string(),
        group: gid.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_falls_back_to_numeric_for_unknown_id() {
        let owner = lookup(u32::MAX - 1, u32::MAX - 1);
        assert_eq!(owner.user, (u32::MAX - 1).to_string());
        assert_eq!(owner.group, (u32::MAX - 1).to_string());
    }
}
