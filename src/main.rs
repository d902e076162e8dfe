use std::error::Error;
use std::sync::Arc;

use futures::future::FutureExt;
use sqlx::postgres::PgPool;
use tokio::sync::mpsc;
use warp::Filter;

use glossary_backend::config::{get_variable, get_variable_or, parse_variable};
use glossary_backend::db::PgDb;
use glossary_backend::environment::{Config, Environment};
use glossary_backend::routes::{self, admin::TerminationFunctionWrapper};
use glossary_backend::store::S3Store;
use logging::{info, initialize_logger, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let store = Arc::new(S3Store::from_env()?);

    let main_port: u16 = parse_variable("BACKEND_PORT");
    let admin_port: u16 = parse_variable("BACKEND_ADMIN_PORT");

    info!(logger, "Starting..."; "build" => info::describe(), "main_port" => main_port, "admin_port" => admin_port);
    let logger = Arc::new(logger);

    info!(logger, "Creating database pool...");
    let connection_string = get_variable("BACKEND_DB_CONNECTION_STRING");
    let pool = PgPool::connect(&connection_string).await?;
    let db = Arc::new(PgDb::new(pool));

    let config = Config::new(
        get_variable("BACKEND_API_PREFIX"),
        get_variable_or("BACKEND_DEFAULT_CONTENT_TYPE", "video/webm"),
    );
    let environment = Environment::new(logger.clone(), db, store, config);

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate: TerminationFunctionWrapper<'static> = {
        let logger = logger.clone();

        Arc::new(move || {
            let termination_sender = termination_sender.clone();
            let logger = logger.clone();

            async move {
                if termination_sender.send(()).await.is_err() {
                    warn!(logger, "Termination already in progress");
                }
            }
            .boxed()
        })
    };

    let should_terminate = async move {
        termination_receiver.recv().await;
    }
    .shared();

    let ctrlc = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();
        let logger = logger.clone();

        async move {
            tokio::select! {
                _ = should_terminate => {},
                _ = tokio::signal::ctrl_c() => {
                    info!(logger, "Received interrupt");
                    terminate().await;
                }
            }
        }
    };

    let main_server = {
        let should_terminate = should_terminate.clone();
        let logger = logger.clone();

        let routes = routes::make_api_routes(environment)
            .recover(move |r| routes::format_rejection(logger.clone(), r));

        let (_, main_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let admin_server = {
        let should_terminate = should_terminate.clone();

        let routes = routes::admin::make_healthz_route()
            .or(routes::admin::make_termination_route(terminate));

        let (_, admin_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], admin_port), async {
                should_terminate.await;
            });

        admin_server
    };

    tokio::join!(ctrlc, main_server, admin_server);

    info!(logger, "Exiting gracefully...");

    Ok(())
}
