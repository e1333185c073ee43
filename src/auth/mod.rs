//! Identity resolution and token brokerage against the ambient Azure CLI
//! session.

mod azure_cli;

pub use azure_cli::AzureCliBroker;
