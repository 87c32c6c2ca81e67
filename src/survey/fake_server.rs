// A local http server standing in for the Google endpoints in tests.

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;

use tiny_http::{Response, Server, StatusCode};

/// What the server received.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
    pub body: String,
}

pub struct FakeServer {
    pub base: String,
    server: Arc<Server>,
    seen: Arc<Mutex<Vec<Seen>>>,
    handle: thread::JoinHandle<()>,
}

impl FakeServer {
    /// Answers every request with the status and body returned by the handler.
    pub fn spawn<F>(handler: F) -> FakeServer
    where
        F: Fn(&Seen) -> (u16, String) + Send + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("http server"));
        let base = format!("http://{}", server.server_addr());
        let seen: Arc<Mutex<Vec<Seen>>> = Arc::new(Mutex::new(Vec::new()));
        let server_clone = Arc::clone(&server);
        let seen_clone = Arc::clone(&seen);
        let handle = thread::spawn(move || {
            while let Ok(mut req) = server_clone.recv() {
                let mut body = String::new();
                let _ = req.as_reader().read_to_string(&mut body);
                let s = Seen {
                    method: req.method().to_string(),
                    url: req.url().to_string(),
                    authorization: req
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("Authorization"))
                        .map(|h| h.value.as_str().to_string()),
                    body,
                };
                let (status, reply) = handler(&s);
                seen_clone.lock().expect("seen lock").push(s);
                let _ = req.respond(Response::from_string(reply).with_status_code(StatusCode(status)));
            }
        });
        FakeServer {
            base,
            server,
            seen,
            handle,
        }
    }

    /// Stops the server and returns the requests it received, in order.
    pub fn finish(self) -> Vec<Seen> {
        self.server.unblock();
        self.handle.join().expect("server thread");
        let seen = self.seen.lock().expect("seen lock");
        seen.clone()
    }
}
