mod api;
mod client;
mod config;
mod emulator;
mod index;
mod input;
mod session;

use crate::{
    client::{ClientApi, ClientRegistry},
    config::Config,
    emulator::{EmulatorApi, EmulatorHandle},
    index::{controller_page, Assets},
    session::pad_socket,
};
use color_eyre::eyre;
use poem::{
    endpoint::EmbeddedFilesEndpoint, get, listener::TcpListener, middleware::Tracing, EndpointExt,
    Route, Server,
};
use poem_openapi::OpenApiService;

#[tokio::main]
async fn main() -> Result<(), eyre::Error> {
    // Lets get pretty error reports
    color_eyre::install()?;

    // Use async-friendly logging for Poem
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "padlink=debug,poem=info".to_string()),
        )
        .init();

    // Read the configs from Env Variables and then fall back to the .env file.
    let config = Config::load()?;

    // Shared state for the socket sessions and the API
    let registry = ClientRegistry::new(config.max_clients);
    let emulator = EmulatorHandle::new(&config.dolphin_path);

    // Setup OpenAPI Swagger Page
    let api_service = OpenApiService::new((ClientApi, EmulatorApi), "Padlink", "0.1.0")
        .server(format!("http://{}/api", config.web_url));
    let spec = api_service.spec_endpoint();
    let swagger = api_service.swagger_ui();

    // Route inbound traffic
    let route = Route::new()
        // Developer friendly locations
        .nest("/api", api_service)
        .at("/spec", spec)
        .nest("/swagger", swagger)
        .nest("/assets", EmbeddedFilesEndpoint::<Assets>::new())
        // User friendly locations
        .at("/ws", get(pad_socket))
        .at("/", get(controller_page))
        // Global context to be shared
        .data(config.clone())
        .data(registry)
        .data(emulator)
        // Utilites being added to our services
        .with(Tracing);

    // Lets run our service
    tracing::info!(web_url = %config.web_url, "starting padlink");
    Server::new(TcpListener::bind(config.web_url)).run(route).await?;

    Ok(())
}
