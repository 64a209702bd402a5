use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id {
    ($n:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $n(pub Uuid);

        impl $n {
            pub fn new() -> Self { Self(Uuid::new_v4()) }
        }

        impl Default for $n {
            fn default() -> Self { Self::new() }
        }

        impl ::core::fmt::Display for $n {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $n {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> { Uuid::parse_str(s).map(Self) }
        }
    };
}

id!(ProfileId);
id!(ConfessionId);
id!(ReportId);

/// Authenticated subject issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: ProfileId,
    pub firebase_uid: String,
    pub username: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confession {
    pub id: ConfessionId,
    pub user_id: ProfileId,
    pub username: String,
    pub content: String,
    pub category: String,
    pub support_count: i64,
    pub is_flagged: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub confession_id: ConfessionId,
    pub user_id: ProfileId,
    pub username: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub id: ReportId,
    pub target_id: ConfessionId,
    pub target_type: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub messages: u64,
    pub reports: u64,
    pub users: u64,
}

/// Backend tables this client reads, writes and watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Profiles,
    Confessions,
    Comments,
    Reports,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Profiles,
        Table::Confessions,
        Table::Comments,
        Table::Reports,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Confessions => "confessions",
            Table::Comments => "comments",
            Table::Reports => "reports",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl ::core::fmt::Display for Table {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        f.write_str(self.name())
    }
}

pub const DEFAULT_CATEGORY: &str = "general";
pub const REPORT_TARGET_CONFESSION: &str = "confession";
