use askama::Template;
use poem::{error::InternalServerError, handler, web::Html};
use rust_embed::RustEmbed;

/// Static assets bundled into the binary.
#[derive(RustEmbed)]
#[folder = "assets"]
pub struct Assets;

/// Template for the controller page
#[derive(Template)]
#[template(path = "index/page/index.html")]
struct Index {}

/// Controller page served to phone browsers
#[handler]
pub async fn controller_page() -> Result<Html<String>, poem::Error> {
    // Render the controller page
    let page = Index {}.render().map_err(InternalServerError)?;

    Ok(Html(page))
}
