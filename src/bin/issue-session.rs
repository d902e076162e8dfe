use std::error::Error;

use dotenv::dotenv;
use sqlx::postgres::PgPool;
use structopt::StructOpt;

use glossary_backend::config::get_variable;
use glossary_backend::db::{Db, PgDb};
use glossary_backend::user::Role;
use logging::{debug, info, initialize_logger};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "issue-session",
    about = "Create a user if needed and print a new bearer token for them"
)]
struct Opt {
    /// The email address identifying the user
    email: String,

    /// The display name to record
    #[structopt(long)]
    name: Option<String>,

    /// The role tag, e.g. MEMBER, ADMIN or INTERPRETER
    #[structopt(long, default_value = "MEMBER")]
    role: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let opt = Opt::from_args();

    let logger = initialize_logger();

    let connection_string = get_variable("BACKEND_DB_CONNECTION_STRING");
    let pool = PgPool::connect(&connection_string).await?;
    let db = PgDb::new(pool);

    let role = Role::from(opt.role.trim().to_uppercase());

    info!(logger, "Issuing session..."; "email" => &opt.email, "role" => role.as_str());

    let token = db.create_session(&opt.email, opt.name, &role).await?;
    debug!(logger, "Issued session"; "email" => &opt.email);

    println!("{}", token);

    Ok(())
}
