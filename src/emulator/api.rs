use crate::{
    api::Tag,
    client::ClientRegistry,
    emulator::core::{emulator_start, emulator_status, emulator_stop, EmulatorHandle, EmulatorStatus},
};
use poem::web::Data;
use poem_openapi::{payload::Json, Object, OpenApi};

/// Emulator state to return via the API
#[derive(Object)]
pub struct EmulatorState {
    status: EmulatorStatus,
}

/// Struct we will build our REST API / Webserver
pub struct EmulatorApi;

#[OpenApi]
impl EmulatorApi {
    /// Start the emulator process
    #[oai(path = "/emulator/start", method = "post", tag = Tag::Emulator)]
    async fn emulator_start_post(
        &self,
        Data(handle): Data<&EmulatorHandle>,
        Data(registry): Data<&ClientRegistry>,
    ) -> Result<Json<EmulatorState>, poem::Error> {
        // Run Emulator start logic
        let status = emulator_start(handle, registry).await?;

        Ok(Json(EmulatorState { status }))
    }

    /// Stop the emulator process
    #[oai(path = "/emulator/stop", method = "post", tag = Tag::Emulator)]
    async fn emulator_stop_post(
        &self,
        Data(handle): Data<&EmulatorHandle>,
        Data(registry): Data<&ClientRegistry>,
    ) -> Result<Json<EmulatorState>, poem::Error> {
        // Run Emulator stop logic
        let status = emulator_stop(handle, registry).await?;

        Ok(Json(EmulatorState { status }))
    }

    /// Get the current emulator state
    #[oai(path = "/emulator/status", method = "get", tag = Tag::Emulator)]
    async fn emulator_status_get(
        &self,
        Data(handle): Data<&EmulatorHandle>,
    ) -> Result<Json<EmulatorState>, poem::Error> {
        // Pull emulator state
        let status = emulator_status(handle).await;

        Ok(Json(EmulatorState { status }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poem::{http::StatusCode, test::TestClient};
    use poem_openapi::OpenApiService;

    /// Test the status endpoint on a fresh service
    #[tokio::test]
    async fn test_emulator_status_get() {
        // Test Client
        let ep = OpenApiService::new(EmulatorApi, "test", "1.0");
        let cli = TestClient::new(ep);

        // Test Request
        let response = cli
            .get("/emulator/status")
            .data(EmulatorHandle::new("/no/such/padlink-emulator"))
            .data(ClientRegistry::new(4))
            .send()
            .await;

        // Check status
        response.assert_status_is_ok();

        // Check Values
        let test_json = response.json().await;
        test_json
            .value()
            .object()
            .get("status")
            .assert_string("Stopped");
    }

    /// Test starting a missing emulator binary
    #[tokio::test]
    async fn test_emulator_start_post_not_found() {
        // Test Client
        let ep = OpenApiService::new(EmulatorApi, "test", "1.0");
        let cli = TestClient::new(ep);

        // Test Request
        let response = cli
            .post("/emulator/start")
            .data(EmulatorHandle::new("/no/such/padlink-emulator"))
            .data(ClientRegistry::new(4))
            .send()
            .await;

        // Check status
        response.assert_status(StatusCode::NOT_FOUND);
    }

    /// Test stopping when nothing is running
    #[tokio::test]
    async fn test_emulator_stop_post_idempotent() {
        // Test Client
        let ep = OpenApiService::new(EmulatorApi, "test", "1.0");
        let cli = TestClient::new(ep);

        // Test Request
        let response = cli
            .post("/emulator/stop")
            .data(EmulatorHandle::new("/no/such/padlink-emulator"))
            .data(ClientRegistry::new(4))
            .send()
            .await;

        // Check status
        response.assert_status_is_ok();

        // Check Values
        let test_json = response.json().await;
        test_json
            .value()
            .object()
            .get("status")
            .assert_string("Stopped");
    }
}
