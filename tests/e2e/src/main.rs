fn main() {
    println!("Run `cargo test -p workhive-e2e` to execute the end-to-end scenarios.");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use futures_util::{SinkExt, StreamExt};
    use tokio::task::JoinHandle;

    use workhive_client::{ClientConfig, ClientReport};
    use workhive_protocol::{CommandContainer, PayloadCommand, WireFrame};
    use workhive_server::{PayloadKind, Server, ServerConfig, ServerReport};

    async fn start_server(
        config: ServerConfig,
    ) -> (Arc<Server>, JoinHandle<ServerReport>, u16) {
        let server = Server::new(config);
        let server2 = Arc::clone(&server);
        let handle = tokio::spawn(async move { server2.run().await.unwrap() });
        let port = loop {
            if let Some(addr) = server.local_addr().await {
                break addr.port();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        (server, handle, port)
    }

    async fn run_client(port: u16, client_id: usize) -> ClientReport {
        let config = ClientConfig {
            host: "127.0.0.1".into(),
            port,
            client_id,
        };
        workhive_client::run(&config).await.unwrap()
    }

    /// Single client, sort workload: the server dispatches containers until
    /// the served threshold is crossed, then drains and exits. The dispatch
    /// that crosses the threshold is itself still served, so one client sees
    /// `max_n_served + 1` items.
    #[tokio::test]
    async fn single_client_sort_workload() {
        let (_server, server_handle, port) = start_server(ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            payload: PayloadKind::Container { size: 16 },
            max_n_served: 3,
            n_producer_threads: 1,
            full_queue_sleep: Duration::from_millis(5),
            max_queue_size: 4,
        })
        .await;

        let report = run_client(port, 0).await;
        assert_eq!(report.items_processed, 4);

        let server_report = server_handle.await.unwrap();
        assert_eq!(server_report.packages_served, 4);
    }

    /// Sleep workload under forced backpressure: a tiny queue, more
    /// producers than capacity, two concurrent workers. The clients
    /// collectively complete exactly the served threshold.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn two_clients_share_a_backpressured_sleep_workload() {
        let (_server, server_handle, port) = start_server(ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            payload: PayloadKind::Sleep { seconds: 0.01 },
            max_n_served: 10,
            n_producer_threads: 4,
            full_queue_sleep: Duration::from_millis(10),
            max_queue_size: 2,
        })
        .await;

        let worker_a = tokio::spawn(run_client(port, 1));
        let worker_b = tokio::spawn(run_client(port, 2));

        let report_a = worker_a.await.unwrap();
        let report_b = worker_b.await.unwrap();
        let server_report = server_handle.await.unwrap();

        // Requests already in flight when the threshold trips are still
        // served, so the total may overshoot by up to one per live session.
        let served = server_report.packages_served;
        assert!(served > 10 && served <= 12, "served {served} packages");
        assert_eq!(
            report_a.items_processed + report_b.items_processed,
            served
        );
    }

    /// Zero-work threshold: the first successful dispatch crosses the
    /// threshold immediately, trips the shutdown, and the server exits
    /// having served just that one item.
    #[tokio::test]
    async fn zero_threshold_stops_after_the_first_dispatch() {
        let (_server, server_handle, port) = start_server(ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            payload: PayloadKind::Sleep { seconds: 0.0 },
            max_n_served: 0,
            n_producer_threads: 1,
            full_queue_sleep: Duration::from_millis(2),
            max_queue_size: 4,
        })
        .await;

        let report = run_client(port, 0).await;
        assert_eq!(report.items_processed, 1);

        let server_report = server_handle.await.unwrap();
        assert_eq!(server_report.packages_served, 1);
    }

    /// Client backoff pacing: against a server that only ever answers
    /// `no_data`, successive work requests are separated by at least the
    /// minimum backoff.
    #[tokio::test]
    async fn client_paces_requests_against_an_idle_server() {
        const OBSERVED_REQUESTS: usize = 4;

        // A scripted server: accepts one connection, answers every request
        // with no_data and records the request arrival times.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let script = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let mut arrivals = Vec::new();
            while arrivals.len() < OBSERVED_REQUESTS {
                let message = match ws.next().await {
                    Some(Ok(message)) => message,
                    _ => break,
                };
                let frame = match message {
                    tokio_tungstenite::tungstenite::Message::Text(text) => {
                        WireFrame::Text(text.to_string())
                    }
                    tokio_tungstenite::tungstenite::Message::Binary(data) => {
                        WireFrame::Binary(data.to_vec())
                    }
                    _ => continue,
                };
                let request = workhive_protocol::decode(frame).unwrap();
                assert_eq!(request.command(), PayloadCommand::GetData);
                arrivals.push(Instant::now());

                let reply = workhive_protocol::encode(&CommandContainer::no_data()).unwrap();
                let message = match reply {
                    WireFrame::Text(text) => {
                        tokio_tungstenite::tungstenite::Message::Text(text.into())
                    }
                    WireFrame::Binary(data) => {
                        tokio_tungstenite::tungstenite::Message::Binary(data.into())
                    }
                };
                ws.send(message).await.unwrap();
            }

            let _ = ws.close(None).await;
            arrivals
        });

        let client = tokio::spawn(run_client(port, 0));
        let arrivals = script.await.unwrap();
        let report = client.await.unwrap();

        assert_eq!(report.items_processed, 0);
        assert_eq!(arrivals.len(), OBSERVED_REQUESTS);
        for gap in arrivals.windows(2) {
            let spacing = gap[1] - gap[0];
            // The backoff sleeps 10..=50 ms before each retry; allow a
            // millisecond of timer slack below the bound.
            assert!(
                spacing >= Duration::from_millis(9),
                "requests only {spacing:?} apart"
            );
        }
    }
}
