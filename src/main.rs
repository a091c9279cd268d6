#[tokio::main]
async fn main() {
    if let Err(e) = serial_terminal_lib::run(std::env::args_os()).await {
        eprintln!("serial-terminal: {}", e);
        std::process::exit(1);
    }
}
