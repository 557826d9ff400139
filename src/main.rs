#[tokio::main]
async fn main() {
    if let Err(e) = vaxsubmit_lib::run().await {
        eprintln!("vaxsubmit: {e}");
        std::process::exit(1);
    }
}
