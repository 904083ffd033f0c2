use poem_openapi::Tags;

/// Tags to group our API endpoints
#[derive(Tags)]
pub enum Tag {
    Client,
    Emulator,
}
