use framelink::config::ClientConfig;
use framelink::handshake::connect_async_with_config;
use framelink::message::Message;
use futures::StreamExt;
use log::{error, info};

async fn handle_connection(addr: &str) {
    let client_config = ClientConfig {
        ca_file: Some(String::from("ca.crt")),
        ..Default::default()
    };

    match connect_async_with_config(addr, Some(client_config)).await {
        Ok(mut ws_connection) => {
            if ws_connection
                .send_as_text(String::from("hello over TLS"))
                .await
                .is_err()
            {
                error!("Failed to send message");
                return;
            }

            while let Some(result) = ws_connection.next().await {
                match result {
                    Ok(Message::Text(text)) => {
                        info!("Received message: {}", text);
                        if ws_connection.close_connection().await.is_err() {
                            error!("Error occurred when closing connection");
                        }
                    }
                    Ok(Message::Close(reason)) => {
                        info!("Connection closed: {:?}", reason);
                        break;
                    }
                    Ok(other) => info!("Received: {:?}", other),
                    Err(err) => {
                        error!("Received error from the stream: {}", err);
                        break;
                    }
                }
            }
        }
        Err(err) => error!("Error when performing handshake: {}", err),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    handle_connection("wss://localhost:9002").await;
}
