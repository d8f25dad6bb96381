//! Launch, connect and disconnect VPN clients by name.
//!
//! The engine treats these as opaque capabilities: it runs whatever argv the
//! catalogue holds and only looks at the exit status.

use std::rc::Rc;

use super::executor::CommandExecutor;
use super::probes::Platform;
use crate::config::Config;
use crate::constants;
use crate::error::{Error, Result};
use crate::state::VpnClient;

/// What a successful disconnect request reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectTarget {
    /// A catalogue client's own disconnect command.
    Client,
    /// The system VPN service of that name.
    SystemService,
}

pub trait ClientControl {
    /// Brings the named client's application up.
    ///
    /// # Errors
    ///
    /// Fails if the client is unknown, has no launch command, or the command
    /// fails.
    fn launch(&self, name: &str) -> Result<()>;

    /// Asks the named client to connect.
    ///
    /// # Errors
    ///
    /// [`Error::Unsupported`] if the client has no connect command.
    fn connect(&self, name: &str) -> Result<()>;

    /// Asks the named client, or the system VPN service of that name, to
    /// disconnect.
    ///
    /// # Errors
    ///
    /// Fails if the command cannot run or reports failure.
    fn disconnect(&self, name: &str) -> Result<DisconnectTarget>;
}

/// Runs catalogue commands through a [`CommandExecutor`].
pub struct CommandClientControl {
    executor: Rc<dyn CommandExecutor>,
    platform: Platform,
    clients: Vec<VpnClient>,
}

impl CommandClientControl {
    #[must_use]
    pub fn new(executor: Rc<dyn CommandExecutor>, platform: Platform, config: &Config) -> Self {
        Self {
            executor,
            platform,
            clients: config.clients.clone(),
        }
    }

    fn client(&self, name: &str) -> Option<&VpnClient> {
        self.clients
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn known(&self, name: &str) -> Result<&VpnClient> {
        self.client(name)
            .ok_or_else(|| Error::UnknownClient(name.to_string()))
    }

    fn run_argv<S: AsRef<str>>(&self, argv: &[S]) -> Result<()> {
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::Unsupported("empty command".to_string()));
        };
        let program = program.as_ref();
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        log::info!("Running {program} {}", args.join(" "));

        let output = self.executor.run(program, &args)?;
        if output.success() {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                program: program.to_string(),
                code: output.exit_code,
            })
        }
    }
}

impl ClientControl for CommandClientControl {
    fn launch(&self, name: &str) -> Result<()> {
        let client = self.known(name)?;
        let argv = client
            .launch_command()
            .ok_or_else(|| Error::Unsupported(format!("{} has no launch command", client.name)))?;
        self.run_argv(&argv)
    }

    fn connect(&self, name: &str) -> Result<()> {
        let client = self.known(name)?;
        let argv = client
            .connect
            .as_ref()
            .ok_or_else(|| Error::Unsupported(constants::MSG_CONNECT_UNSUPPORTED.to_string()))?;
        self.run_argv(argv)
    }

    fn disconnect(&self, name: &str) -> Result<DisconnectTarget> {
        match self.client(name) {
            Some(client) => {
                let argv = client.disconnect.as_ref().ok_or_else(|| {
                    Error::Unsupported(format!("{} has no disconnect command", client.name))
                })?;
                self.run_argv(argv)?;
                Ok(DisconnectTarget::Client)
            }
            None => {
                let (program, args) = self.platform.stop_service_command(name);
                let mut argv = vec![program.to_string()];
                argv.extend(args);
                self.run_argv(&argv)?;
                Ok(DisconnectTarget::SystemService)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::{ClientControl, DisconnectTarget};
    use crate::error::{Error, Result};
    use std::cell::RefCell;

    /// Records calls; fails any call whose name is in `failing`. Names in
    /// `clients` disconnect as catalogue clients, others as system services.
    #[derive(Default)]
    pub struct RecordingControl {
        pub calls: RefCell<Vec<String>>,
        pub failing: Vec<String>,
        pub clients: Vec<String>,
    }

    impl RecordingControl {
        fn record(&self, action: &str, name: &str) -> Result<()> {
            self.calls.borrow_mut().push(format!("{action} {name}"));
            if self.failing.iter().any(|f| f == name) {
                return Err(Error::Unsupported(format!("{action} failed")));
            }
            Ok(())
        }
    }

    impl ClientControl for RecordingControl {
        fn launch(&self, name: &str) -> Result<()> {
            self.record("launch", name)
        }

        fn connect(&self, name: &str) -> Result<()> {
            self.record("connect", name)
        }

        fn disconnect(&self, name: &str) -> Result<DisconnectTarget> {
            self.record("disconnect", name)?;
            if self.clients.iter().any(|c| c == name) {
                Ok(DisconnectTarget::Client)
            } else {
                Ok(DisconnectTarget::SystemService)
            }
        }
    }
}
