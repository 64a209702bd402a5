use std::str::FromStr;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use super::{CommandLineConfirm, Dispatch, Flow};
use crate::controllers::feed::FeedSort;
use crate::entities::ConfessionId;
use crate::error::AppResult;
use crate::session::SessionBootstrapper;
use crate::surfaces::UserApp;

impl FromStr for FeedSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(FeedSort::Latest),
            "trending" => Ok(FeedSort::Trending),
            "supported" => Ok(FeedSort::Supported),
            s => Err(format!("unknown sort `{}`", s)),
        }
    }
}

#[derive(Debug, Parser)]
#[clap(name = "hushwall", no_binary_name = true, disable_version_flag = true)]
pub struct UserLine {
    #[clap(subcommand)]
    pub cmd: UserCommand,
}

#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// sign in with email and password.
    Signin { email: String, password: String },
    /// create an account.
    Signup { email: String, password: String },
    Signout,
    /// choose the username shown on your confessions.
    Claim { username: String },
    /// show the feed: latest, trending or supported.
    Feed {
        #[clap(default_value = "latest")]
        sort: FeedSort,
    },
    /// post a confession (at least 10 characters).
    Post {
        #[clap(required = true)]
        content: Vec<String>,
    },
    Support { id: ConfessionId },
    Report {
        id: ConfessionId,
        #[clap(required = true)]
        reason: Vec<String>,
    },
    Delete {
        id: ConfessionId,
        #[clap(long, short)]
        yes: bool,
    },
    Comments { id: ConfessionId },
    Comment {
        id: ConfessionId,
        #[clap(required = true)]
        text: Vec<String>,
    },
    Quit,
}

#[async_trait]
impl Dispatch for UserApp {
    type Line = UserLine;

    fn session(&self) -> &SessionBootstrapper { &self.boot }

    async fn dispatch(
        &self,
        UserLine { cmd }: UserLine,
        out: &mpsc::Sender<String>,
    ) -> AppResult<Flow> {
        match cmd {
            UserCommand::Signin { email, password } => self.boot.sign_in(&email, &password).await?,
            UserCommand::Signup { email, password } => self.boot.sign_up(&email, &password).await?,
            UserCommand::Signout => self.boot.sign_out().await?,
            UserCommand::Claim { username } => {
                self.boot.claim_username(&username).await?;
            },
            UserCommand::Feed { sort } => self.feed.load(sort).await?,
            UserCommand::Post { content } => self.feed.post(&content.join(" ")).await?,
            UserCommand::Support { id } => {
                self.feed.react(id).await?;
            },
            UserCommand::Report { id, reason } => self.feed.report(id, &reason.join(" ")).await?,
            UserCommand::Delete { id, yes } => {
                let confirm = CommandLineConfirm {
                    yes,
                    out: out.clone(),
                };
                self.feed.delete(id, &confirm).await?;
            },
            UserCommand::Comments { id } => self.feed.comments(id).await?,
            UserCommand::Comment { id, text } => self.feed.comment(id, &text.join(" ")).await?,
            UserCommand::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::{parse_line, Conductor, Parsed};
    use super::*;
    use crate::constructors;
    use crate::identity::IdentityProvider;
    use crate::presenters::impls::ret::{drain, Rendered, ReturnPresenter};
    use crate::presenters::views::Screen;
    use crate::repositories::ConfessionRepository;

    fn parse(line: &str) -> UserCommand {
        match parse_line::<UserLine>(line) {
            Some(Parsed::Command(UserLine { cmd })) => cmd,
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn quoted_and_bare_words() {
        match parse(r#"post "nobody knows" that I sing"#) {
            UserCommand::Post { content } => assert_eq!(content.join(" "), "nobody knows that I sing"),
            c => panic!("{:?}", c),
        }

        assert!(matches!(parse("feed"), UserCommand::Feed { sort: FeedSort::Latest }));
        assert!(matches!(
            parse("feed supported"),
            UserCommand::Feed {
                sort: FeedSort::Supported
            }
        ));

        let id = ConfessionId::new();
        assert!(matches!(
            parse(&format!("delete {} --yes", id)),
            UserCommand::Delete { id: i, yes: true } if i == id
        ));
    }

    #[test]
    fn usage_errors_are_shown() {
        assert!(parse_line::<UserLine>("   ").is_none());
        assert!(matches!(
            parse_line::<UserLine>("support not-a-uuid"),
            Some(Parsed::Showing(_))
        ));
        assert!(matches!(
            parse_line::<UserLine>("feed sideways"),
            Some(Parsed::Showing(_))
        ));
        assert!(matches!(
            parse_line::<UserLine>("post"),
            Some(Parsed::Showing(_))
        ));
    }

    #[tokio::test]
    async fn a_session_from_the_command_line() {
        let backend = constructors::in_memory();
        let (pres, mut rx) = ReturnPresenter::new();
        let app = Arc::new(UserApp::assemble(&backend, Arc::new(pres)));
        let (out, mut printed) = mpsc::channel(16);
        let conductor = Conductor {
            surface: app.clone(),
            out,
        };

        conductor.handle("signup someone@example.com secret1").await;
        let signed_up = backend.identity.observe().borrow().clone();
        app.boot.on_session_change(signed_up).await.unwrap();
        assert_eq!(app.boot.state.read().await.screen, Screen::UsernameClaim);

        conductor.handle("claim someone_").await;
        conductor.handle("post 'this stays between us'").await;
        drain(&mut rx);

        conductor.handle("feed latest").await;
        let feed = drain(&mut rx)
            .into_iter()
            .find_map(|r| match r {
                Rendered::Feed(rows) => Some(rows),
                _ => None,
            })
            .unwrap();
        assert_eq!(feed.len(), 1);
        assert!(feed[0].can_delete);

        conductor.handle(&format!("delete {}", feed[0].id)).await;
        assert!(printed.recv().await.unwrap().contains("--yes"));
        assert_eq!(backend.confessions.count().await.unwrap(), 1);

        assert_eq!(conductor.handle("quit").await, Flow::Quit);
    }
}
