use std::sync::Arc;

use crate::entities::{Comment, Confession, Profile, Report};
use crate::identity::firebase::FirebaseIdentityProvider;
use crate::identity::mock::InMemoryIdentityProvider;
use crate::identity::IdentityProvider;
use crate::realtime::mock::ChangeHub;
use crate::realtime::phoenix::PhoenixChangeSource;
use crate::realtime::ChangeSource;
use crate::repositories::mock::InMemoryRepository;
use crate::repositories::postgrest::{PostgrestClient, PostgrestRepository};
use crate::repositories::{
    CommentRepository, ConfessionRepository, ProfileRepository, ReportRepository,
};

/// every remote collaborator a surface talks to.
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityProvider + Sync + Send>,
    pub profiles: Arc<dyn ProfileRepository + Sync + Send>,
    pub confessions: Arc<dyn ConfessionRepository + Sync + Send>,
    pub comments: Arc<dyn CommentRepository + Sync + Send>,
    pub reports: Arc<dyn ReportRepository + Sync + Send>,
    pub changes: Arc<dyn ChangeSource + Sync + Send>,
}

/// in-process backend; every write is echoed as a realtime change.
pub fn in_memory() -> Backend {
    let hub = ChangeHub::new();

    Backend {
        identity: Arc::new(InMemoryIdentityProvider::new()),
        profiles: Arc::new(InMemoryRepository::<Profile>::with_hub(hub.clone())),
        confessions: Arc::new(InMemoryRepository::<Confession>::with_hub(hub.clone())),
        comments: Arc::new(InMemoryRepository::<Comment>::with_hub(hub.clone())),
        reports: Arc::new(InMemoryRepository::<Report>::with_hub(hub.clone())),
        changes: Arc::new(hub),
    }
}

/// Firebase accounts plus a Supabase project.
pub fn hosted(
    firebase_api_key: impl Into<String>,
    supabase_url: impl AsRef<str>,
    supabase_anon_key: impl Into<String>,
) -> ::anyhow::Result<Backend> {
    let anon_key = supabase_anon_key.into();
    let client = PostgrestClient::new(supabase_url.as_ref(), anon_key.clone());

    let b = Backend {
        identity: Arc::new(FirebaseIdentityProvider::new(firebase_api_key)),
        profiles: Arc::new(PostgrestRepository::<Profile>::new_with(client.clone())),
        confessions: Arc::new(PostgrestRepository::<Confession>::new_with(client.clone())),
        comments: Arc::new(PostgrestRepository::<Comment>::new_with(client.clone())),
        reports: Arc::new(PostgrestRepository::<Report>::new_with(client)),
        changes: Arc::new(PhoenixChangeSource::new(supabase_url.as_ref(), anon_key)?),
    };

    Ok(b)
}
