#[tokio::main]
async fn main() {
    if let Err(error) = practicum_chat::web::run().await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
