use async_trait::async_trait;
use serde_derive::Serialize;

use super::{ControllerError, ControllerState, LightCommand, LightController};
use crate::models;

/// Light entity driven through the Home Assistant REST API
pub struct HomeAssistant {
    client: reqwest::Client,
    base_url: String,
    token: String,
    entity: String,
}

#[derive(Serialize)]
struct ServiceCall<'a> {
    entity_id: &'a str,
    #[serde(flatten)]
    command: &'a LightCommand,
}

impl HomeAssistant {
    pub fn new(config: &models::Controller, token: &str) -> Result<Self, ControllerError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_owned(),
            token: token.to_owned(),
            entity: config.entity.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    async fn call_service(
        &self,
        service: &str,
        command: &LightCommand,
    ) -> Result<(), ControllerError> {
        let response = self
            .client
            .post(self.endpoint(&format!("services/light/{}", service)))
            .bearer_auth(&self.token)
            .json(&ServiceCall {
                entity_id: &self.entity,
                command,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ControllerError::Status { status });
        }

        Ok(())
    }
}

#[async_trait]
impl LightController for HomeAssistant {
    #[instrument(skip(self), fields(entity = %self.entity))]
    async fn state(&self) -> Result<ControllerState, ControllerError> {
        let response = self
            .client
            .get(self.endpoint(&format!("states/{}", self.entity)))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ControllerError::Status { status });
        }

        Ok(response.json().await?)
    }

    #[instrument(skip(self), fields(entity = %self.entity))]
    async fn turn_on(&self, command: &LightCommand) -> Result<(), ControllerError> {
        self.call_service("turn_on", command).await
    }

    #[instrument(skip(self), fields(entity = %self.entity))]
    async fn turn_off(&self) -> Result<(), ControllerError> {
        self.call_service("turn_off", &LightCommand::default()).await
    }
}

impl std::fmt::Debug for HomeAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistant")
            .field("base_url", &self.base_url)
            .field("entity", &self.entity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    use super::*;
    use crate::models::{Color, ColorMode};

    #[derive(Debug)]
    struct Request {
        head: String,
        body: String,
    }

    /// Answer a single HTTP request with `status` and `body`
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<Request>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());

        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            let (head, body_start, content_length) = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);

                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..pos]).into_owned();
                    let content_length = head
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            if name.eq_ignore_ascii_case("content-length") {
                                value.trim().parse::<usize>().ok()
                            } else {
                                None
                            }
                        })
                        .unwrap_or(0);
                    break (head, pos + 4, content_length);
                }
            };

            while buf.len() < body_start + content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            Request {
                head,
                body: String::from_utf8_lossy(&buf[body_start..body_start + content_length])
                    .into_owned(),
            }
        });

        (url, task)
    }

    fn client(url: String) -> HomeAssistant {
        let config = models::Controller {
            url,
            entity: "light.test".to_owned(),
            ..Default::default()
        };

        HomeAssistant::new(&config, "secret").unwrap()
    }

    #[tokio::test]
    async fn fetch_state() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"state":"on","attributes":{"rgb_color":[10,20,30],"brightness":128}}"#,
        )
        .await;

        let state = client(url).state().await.unwrap();
        assert!(state.is_on());
        assert_eq!(state.attributes.color(), Some(Color::new(10, 20, 30)));

        let request = server.await.unwrap();
        assert!(request.head.starts_with("GET /api/states/light.test HTTP/1.1"));
        assert!(request
            .head
            .to_ascii_lowercase()
            .contains("authorization: bearer secret"));
    }

    #[tokio::test]
    async fn send_color() {
        let (url, server) = serve_once("200 OK", "[]").await;

        let command = LightCommand::color(Color::new(255, 128, 0), ColorMode::Rgb, 255);
        client(url).turn_on(&command).await.unwrap();

        let request = server.await.unwrap();
        assert!(request
            .head
            .starts_with("POST /api/services/light/turn_on HTTP/1.1"));

        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "entity_id": "light.test",
                "rgb_color": [255, 128, 0],
                "brightness": 255
            })
        );
    }

    #[tokio::test]
    async fn turn_off_sends_entity_only() {
        let (url, server) = serve_once("200 OK", "[]").await;

        client(url).turn_off().await.unwrap();

        let request = server.await.unwrap();
        assert!(request
            .head
            .starts_with("POST /api/services/light/turn_off HTTP/1.1"));

        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body, serde_json::json!({ "entity_id": "light.test" }));
    }

    #[tokio::test]
    async fn report_error_status() {
        let (url, server) = serve_once("401 Unauthorized", "{}").await;

        let result = client(url).turn_on(&LightCommand::default()).await;
        assert!(matches!(
            result,
            Err(ControllerError::Status { status }) if status == reqwest::StatusCode::UNAUTHORIZED
        ));

        server.await.unwrap();
    }
}
