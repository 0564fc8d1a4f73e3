use clap::Parser;
use reggie::{
    config::ClientConfig, response::TagResponse, secrets::RegistryAuth, Client, PathParams,
};
use tracing::{debug, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// List the tags of a repository, authenticating against the registry if asked to
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose mode
    #[clap(short, long)]
    verbose: bool,

    /// Username used to obtain a token from the registry auth realm
    #[clap(short, long, requires = "password")]
    username: Option<String>,

    /// Password used to obtain a token from the registry auth realm
    #[clap(short, long, env = "REGGIE_PASSWORD")]
    password: Option<String>,

    /// Maximum number of tags to return
    #[clap(short = 'n', long)]
    limit: Option<usize>,

    /// Return tags lexically after this one
    #[clap(long)]
    last: Option<String>,

    /// Registry address, e.g. https://registry-1.docker.io
    registry: String,

    /// Repository name, e.g. library/alpine
    namespace: String,
}

fn build_auth(cli: &Cli) -> RegistryAuth {
    match (&cli.username, &cli.password) {
        (Some(username), Some(password)) => {
            debug!("Using basic credentials");
            RegistryAuth::Basic(username.clone(), password.clone())
        }
        _ => RegistryAuth::Anonymous,
    }
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // setup logging
    let level_filter = if cli.verbose { "debug" } else { "info" };
    let filter_layer = EnvFilter::new(level_filter);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ClientConfig::new(&cli.registry, &cli.namespace, build_auth(&cli))?
        .with_user_agent(concat!("reggie/", env!("CARGO_PKG_VERSION")))?;
    let client = Client::new(config);

    let mut req = client.new_request_with("GET", "/v2/:name/tags/list", PathParams::new())?;
    if let Some(n) = cli.limit {
        req.set_query_param("n", n.to_string());
    }
    if let Some(last) = &cli.last {
        req.set_query_param("last", last);
    }

    info!(url = %req.url(client.config().address()), "listing tags");
    let resp = client.execute(&req).await?;
    if !resp.status().is_success() {
        anyhow::bail!(
            "registry answered {}: {}",
            resp.status(),
            resp.text().unwrap_or("<binary body>")
        );
    }

    let tags: TagResponse = resp.json()?;
    for tag in tags.tags {
        println!("{}", tag);
    }
    Ok(())
}
