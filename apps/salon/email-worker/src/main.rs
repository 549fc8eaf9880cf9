//! Salon Email Worker - Entry Point
//!
//! Background worker that turns reservation events into emails.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    core_config::tracing::install_color_eyre();
    salon_email_worker::run().await
}
