use keyring::Entry;

use crate::error::{Result, ScriptError};

const SERVICE_NAME: &str = "sqlrun";

fn entry_for(connection_name: &str) -> Result<Entry> {
    if connection_name.trim().is_empty() {
        return Err(ScriptError::InvalidArgument(
            "connection name must not be empty".to_string(),
        ));
    }
    Ok(Entry::new(SERVICE_NAME, connection_name)?)
}

/// Store a password in the OS keyring for the given connection name.
pub fn store_password(connection_name: &str, password: &str) -> Result<()> {
    entry_for(connection_name)?
        .set_password(password)
        .map_err(|e| ScriptError::Credential(format!("Failed to store password in keyring: {}", e)))
}

/// Retrieve a password from the OS keyring for the given connection name.
/// Returns Ok(None) if no credential is found (not an error).
pub fn get_password(connection_name: &str) -> Result<Option<String>> {
    match entry_for(connection_name)?.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(ScriptError::Credential(format!(
            "Failed to retrieve password from keyring: {}",
            e
        ))),
    }
}

/// Delete a password from the OS keyring for the given connection name.
/// Silently succeeds if no credential exists.
pub fn delete_password(connection_name: &str) -> Result<()> {
    match entry_for(connection_name)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(ScriptError::Credential(format!(
            "Failed to delete password from keyring: {}",
            e
        ))),
    }
}
