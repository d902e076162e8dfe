//! Applies the migrations under `./migrations` to the database named by
//! `BACKEND_DB_CONNECTION_STRING`. Used to prepare local and CI databases.

use std::env;
use std::process;

use movine::Movine;
use postgres::{Client, NoTls};

use logging::{debug, error, info, initialize_logger};

const MIGRATION_DIR: &str = "./migrations";

fn main() {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let connection_string = match env::var("BACKEND_DB_CONNECTION_STRING") {
        Ok(s) => s,
        Err(e) => {
            error!(logger, "Cannot read BACKEND_DB_CONNECTION_STRING"; "error" => %e);
            process::exit(2);
        }
    };

    debug!(logger, "Connecting to database...");

    let client = match Client::connect(&connection_string, NoTls) {
        Ok(client) => client,
        Err(e) => {
            error!(logger, "Cannot connect to database"; "error" => %e);
            process::exit(1);
        }
    };

    let mut movine = Movine::new(client);
    movine.set_migration_dir(MIGRATION_DIR);

    if movine.status().is_err() {
        debug!(logger, "Initializing movine...");

        if let Err(e) = movine.initialize() {
            error!(logger, "Cannot initialize movine"; "error" => ?e);
            process::exit(1);
        }
    }

    debug!(logger, "Running migrations..."; "directory" => MIGRATION_DIR);

    if let Err(e) = movine.up() {
        error!(logger, "Migrations failed"; "error" => ?e);
        process::exit(1);
    }

    info!(logger, "Database is up to date");
}
