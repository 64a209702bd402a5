use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    User,
    Admin,
}

impl FromStr for SurfaceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(SurfaceKind::User),
            "admin" => Ok(SurfaceKind::Admin),
            s => Err(format!("unknown surface `{}` (expected `user` or `admin`)", s)),
        }
    }
}

#[derive(Debug, Parser)]
#[clap(name = "hushwall", version, about = "anonymous confession wall and its admin console")]
pub struct Config {
    /// which client to run: `user` or `admin`.
    #[clap(long, default_value = "user")]
    pub surface: SurfaceKind,

    /// use the in-process backend instead of Firebase + Supabase.
    #[clap(long)]
    pub in_memory: bool,

    #[clap(long, env = "FIREBASE_API_KEY", hide_env_values = true)]
    pub firebase_api_key: Option<String>,

    #[clap(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    #[clap(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    pub supabase_anon_key: Option<String>,
}

pub struct HostedValues {
    pub firebase_api_key: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

/// given value, else the one baked in at build time.
macro_rules! or_built_in {
    ($v:expr; $bn:literal, $pn:literal) => {{
        match $v {
            Some(t) => Ok(t),
            None => {
                tracing::warn!("`{}` not given, fallback to built-in...", $pn);

                match option_env!($bn) {
                    Some(t) => Ok(t.to_string()),
                    None => Err(anyhow!("cannot get `{}`!", $pn)),
                }
            },
        }
    }};
}

impl Config {
    pub fn hosted_values(&self) -> Result<HostedValues> {
        let firebase_api_key = or_built_in!(
            self.firebase_api_key.clone(); "BUILD_WITH_FIREBASE_API_KEY", "firebase-api-key"
        )?;
        let supabase_url =
            or_built_in!(self.supabase_url.clone(); "BUILD_WITH_SUPABASE_URL", "supabase-url")?;
        let supabase_anon_key = or_built_in!(
            self.supabase_anon_key.clone(); "BUILD_WITH_SUPABASE_ANON_KEY", "supabase-anon-key"
        )?;

        Ok(HostedValues {
            firebase_api_key,
            supabase_url,
            supabase_anon_key,
        })
    }
}
