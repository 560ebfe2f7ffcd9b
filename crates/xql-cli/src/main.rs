//! XQL command line explainer
//!
//! Prints the token stream and the parsed query model of an XQL statement
//! as JSON.

use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use xql_query::{QueryModel, Token, tokenize};

#[derive(Serialize)]
struct Explain<'a> {
    xql: &'a str,
    tokens: Vec<Token>,
    model: QueryModel,
    multi_entity: bool,
}

#[derive(Serialize)]
struct Failure<'a> {
    xql: &'a str,
    code: &'static str,
    message: String,
    position: Option<usize>,
}

fn explain(xql: &str) -> Result<Explain<'_>, xql_core::Error> {
    let tokens = tokenize(xql)?;
    let model = QueryModel::parse(xql)?;
    Ok(Explain {
        xql,
        tokens,
        multi_entity: model.is_multi_entity(),
        model,
    })
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        error!("Usage: xql <statement>");
        std::process::exit(2);
    }
    let xql = args.join(" ");
    info!("XQL v{}", env!("CARGO_PKG_VERSION"));

    let output = match explain(&xql) {
        Ok(explain) => serde_json::to_string_pretty(&explain),
        Err(e) => {
            error!("{} ({})", e, e.code());
            let failure = Failure {
                xql: &xql,
                code: e.code(),
                message: e.to_string(),
                position: e.position(),
            };
            match serde_json::to_string_pretty(&failure) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Failed to encode error: {}", e),
            }
            std::process::exit(1);
        }
    };

    match output {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to encode query model: {}", e);
            std::process::exit(1);
        }
    }
}
