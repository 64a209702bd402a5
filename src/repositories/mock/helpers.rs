use chrono::{DateTime, Duration, Utc};

use super::super::{RepositoryError, Result as RepoResult};

pub fn find_mut<T, P>(v: &mut [T], preficate: P) -> RepoResult<&mut T>
where
    T: ::core::fmt::Debug,
    P: FnMut(&&mut T) -> bool,
{
    let mut res = v.iter_mut().filter(preficate).collect::<Vec<_>>();

    tracing::trace!("found - {:?}", res);

    match res.len() {
        0 => Err(RepositoryError::NotFound),
        1 => Ok(res.remove(0)),
        i => Err(RepositoryError::NoUnique { matched: i as u32 }),
    }
}

pub fn find_ref<T, P>(v: &[T], preficate: P) -> RepoResult<&T>
where
    T: ::core::fmt::Debug,
    P: FnMut(&&T) -> bool,
{
    let mut res = v.iter().filter(preficate).collect::<Vec<_>>();

    tracing::trace!("found - {:?}", res);

    match res.len() {
        0 => Err(RepositoryError::NotFound),
        1 => Ok(res.remove(0)),
        i => Err(RepositoryError::NoUnique { matched: i as u32 }),
    }
}

pub fn remove_one<T, P>(v: &mut Vec<T>, mut preficate: P) -> RepoResult<T>
where P: FnMut(&T) -> bool {
    let mut indexes = v
        .iter()
        .enumerate()
        .filter(|(_, t)| preficate(t))
        .map(|(i, _)| i)
        .collect::<Vec<_>>();

    match indexes.len() {
        0 => Err(RepositoryError::NotFound),
        1 => Ok(v.remove(indexes.remove(0))),
        i => Err(RepositoryError::NoUnique { matched: i as u32 }),
    }
}

/// strictly increasing insertion timestamps, so `created_at` ordering is total.
#[derive(Debug)]
pub struct Stamper(Option<DateTime<Utc>>);

impl Stamper {
    pub fn new() -> Self { Self(None) }

    pub fn next(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.0 {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };

        self.0 = Some(stamp);
        stamp
    }
}

pub fn apply_limit<T>(mut v: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(n) = limit {
        v.truncate(n);
    }
    v
}
