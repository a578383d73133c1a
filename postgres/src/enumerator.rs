use log::{debug, error, info};
use tokio_postgres::NoTls;

use crate::common::PostgresConfig;
use crate::PostgresError;

/// Lists backup-eligible databases on the server, ordered by name.
///
/// Template databases and the maintenance database used for the listing
/// connection are excluded. A failure here aborts the whole cycle: nothing can
/// be backed up without a listing, and continuing on a partial one would hide
/// a server problem.
pub async fn list_databases(config: &PostgresConfig) -> Result<Vec<String>, PostgresError> {
    let conn_string = config.connection_string();
    let (client, connection) = tokio_postgres::connect(&conn_string, NoTls)
        .await
        .map_err(|e| PostgresError::ConnectionError(e.to_string()))?;

    // Spawn the connection handler
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("Connection error: {e}");
        }
    });

    let rows = client
        .query(
            "SELECT datname FROM pg_database \
             WHERE datistemplate = false AND datname <> $1 \
             ORDER BY datname",
            &[&config.database],
        )
        .await?;

    let databases: Vec<String> = rows.iter().map(|row| row.get(0)).collect();
    info!("Found {} databases eligible for backup", databases.len());
    debug!("Databases: {databases:?}");

    Ok(databases)
}
