use futures::StreamExt;
use framelink::handshake::connect_async;
use framelink::message::Message;
use log::{error, info};
use rand::distr::Alphanumeric;
use rand::{thread_rng, Rng};
use tokio::select;
use tokio::time::{interval, Duration};

async fn handle_connection(addr: &str) {
    match connect_async(addr).await {
        Ok(mut ws_connection) => {
            let mut ticker = interval(Duration::from_secs(5));
            // it will be used for closing the connection
            let mut counter = 0;

            loop {
                select! {
                    Some(result) = ws_connection.next() => {
                        match result {
                            Ok(Message::Text(text)) => {
                                info!("Received message: {}", text);
                                counter += 1;
                                // close the connection once 3 messages have been exchanged
                                if counter >= 3 {
                                    if ws_connection.close_connection().await.is_err() {
                                        error!("Error occurred when closing connection");
                                    }
                                    break;
                                }
                            }
                            Ok(Message::Close(reason)) => {
                                info!("Server closed the connection: {:?}", reason);
                                break;
                            }
                            Ok(other) => info!("Received: {:?}", other),
                            Err(err) => {
                                error!("Received error from the stream: {}", err);
                                break;
                            }
                        }
                    }
                    _ = ticker.tick() => {
                        let random_string = generate_random_string();

                        if ws_connection.send_as_text(random_string).await.is_err() {
                            error!("Failed to send message");
                            break;
                        }
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
    handle_connection("ws://127.0.0.1:9002").await;
}

fn generate_random_string() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}
