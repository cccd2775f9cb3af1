use axum::{extract::State, routing::any, Router};
use clap::Parser;

#[derive(Parser)]
#[command(name = "mock-backend")]
#[command(about = "Minimal HTTP backend for exercising the proxy", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:9001")]
    listen: String,

    /// Name echoed in every response body
    #[arg(short, long, default_value = "backend-1")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let app = Router::new()
        .route("/{*path}", any(hello))
        .route("/", any(hello))
        .with_state(args.name.clone());

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    println!(
        "mock backend '{}' listening on http://{}",
        args.name,
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;

    Ok(())
}

async fn hello(State(name): State<String>) -> String {
    format!("hello from {}\n", name)
}
