pub mod server;

/// Actions the CLI can dispatch to.
pub enum Action {
    Server(server::Args),
}

impl Action {
    /// Run the action to completion.
    ///
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        match self {
            Self::Server(args) => server::execute(args).await,
        }
    }
}
