use tokio::net::TcpListener;

/// Serves the seeded fixture on `$HOST:$PORT` (default `127.0.0.1:3000`).
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    let addr = listener.local_addr()?;
    println!("tt-rss mock API on http://{addr}/api/ (login admin / password)");
    mock_server::run(listener).await
}
