use std::str::FromStr;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use super::{CommandLineConfirm, Dispatch, Flow};
use crate::controllers::moderation::{AdminSort, DeleteOrigin};
use crate::entities::{ConfessionId, ProfileId, ReportId};
use crate::error::AppResult;
use crate::presenters::views::Section;
use crate::session::SessionBootstrapper;
use crate::surfaces::AdminConsole;

impl FromStr for AdminSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(AdminSort::Latest),
            "supported" => Ok(AdminSort::Supported),
            s => Err(format!("unknown sort `{}`", s)),
        }
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overview" => Ok(Section::Overview),
            "messages" => Ok(Section::Messages),
            "reports" => Ok(Section::Reports),
            "users" => Ok(Section::Users),
            s => Err(format!("unknown section `{}`", s)),
        }
    }
}

impl FromStr for DeleteOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "messages" => Ok(DeleteOrigin::Messages),
            "reports" => Ok(DeleteOrigin::Reports),
            s => Err(format!("cannot delete from `{}`", s)),
        }
    }
}

#[derive(Debug, Parser)]
#[clap(name = "hushwall-admin", no_binary_name = true, disable_version_flag = true)]
pub struct AdminLine {
    #[clap(subcommand)]
    pub cmd: AdminCommand,
}

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// open a section: overview, messages, reports or users.
    Section { section: Section },
    Stats,
    /// every message: latest or supported.
    Messages {
        #[clap(default_value = "latest")]
        sort: AdminSort,
    },
    Reports,
    Users,
    Incidents,
    /// delete a message permanently.
    Delete {
        id: ConfessionId,
        /// section to reload afterwards.
        #[clap(long, default_value = "messages")]
        from: DeleteOrigin,
        #[clap(long, short)]
        yes: bool,
    },
    /// drop a report, keeping its message.
    Dismiss { id: ReportId },
    /// grant or remove administrator permissions.
    ToggleAdmin {
        id: ProfileId,
        #[clap(long, short)]
        yes: bool,
    },
    Signout,
    Quit,
}

#[async_trait]
impl Dispatch for AdminConsole {
    type Line = AdminLine;

    fn session(&self) -> &SessionBootstrapper { &self.boot }

    async fn dispatch(
        &self,
        AdminLine { cmd }: AdminLine,
        out: &mpsc::Sender<String>,
    ) -> AppResult<Flow> {
        let m = &self.moderation;

        match cmd {
            AdminCommand::Section { section } => m.show_section(section).await?,
            AdminCommand::Stats => {
                m.load_stats().await?;
            },
            AdminCommand::Messages { sort } => m.load_messages(sort).await?,
            AdminCommand::Reports => m.load_reports().await?,
            AdminCommand::Users => m.load_users().await?,
            AdminCommand::Incidents => m.load_incidents().await?,
            AdminCommand::Delete { id, from, yes } => {
                let confirm = CommandLineConfirm {
                    yes,
                    out: out.clone(),
                };
                m.delete_message(id, from, &confirm).await?;
            },
            AdminCommand::Dismiss { id } => m.dismiss_report(id).await?,
            AdminCommand::ToggleAdmin { id, yes } => {
                let confirm = CommandLineConfirm {
                    yes,
                    out: out.clone(),
                };
                m.toggle_admin(id, &confirm).await?;
            },
            AdminCommand::Signout => self.boot.sign_out().await?,
            AdminCommand::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::io::BufReader;

    use super::super::{parse_line, Conductor, Parsed};
    use super::*;
    use crate::constructors;
    use crate::presenters::impls::ret::{drain, Rendered, ReturnPresenter};

    fn parse(line: &str) -> AdminCommand {
        match parse_line::<AdminLine>(line) {
            Some(Parsed::Command(AdminLine { cmd })) => cmd,
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn admin_commands() {
        assert!(matches!(
            parse("section reports"),
            AdminCommand::Section {
                section: Section::Reports
            }
        ));
        assert!(matches!(
            parse("messages supported"),
            AdminCommand::Messages {
                sort: AdminSort::Supported
            }
        ));

        let id = ConfessionId::new();
        assert!(matches!(
            parse(&format!("delete {} --from reports -y", id)),
            AdminCommand::Delete {
                from: DeleteOrigin::Reports,
                yes: true,
                ..
            }
        ));
        assert!(matches!(
            parse(&format!("toggle-admin {}", ProfileId::new())),
            AdminCommand::ToggleAdmin { yes: false, .. }
        ));
        assert!(matches!(
            parse_line::<AdminLine>("messages trending"),
            Some(Parsed::Showing(_))
        ));
    }

    #[tokio::test]
    async fn signed_out_console_stops_the_command_loop() {
        let backend = constructors::in_memory();
        let (pres, mut rx) = ReturnPresenter::new();
        let console = Arc::new(AdminConsole::assemble(&backend, Arc::new(pres)));
        let (out, _printed) = mpsc::channel(16);

        console.boot.on_session_change(None).await.unwrap();

        let conductor = Conductor {
            surface: console.clone(),
            out,
        };
        // returns after at most one line
        conductor
            .run(BufReader::new(&b"stats\n"[..]))
            .await
            .unwrap();

        let rendered = drain(&mut rx);
        assert!(rendered.contains(&Rendered::Redirect));
        assert!(!rendered.iter().any(|r| matches!(r, Rendered::Stats(_))));
    }
}
