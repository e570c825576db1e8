use core::{fmt, hint::black_box};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::stream::{FuturesUnordered, StreamExt};
use std::{
    net::TcpStream,
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};
use tokio::runtime::Builder;
use tonic::{
    codec::CompressionEncoding,
    transport::{Channel, Uri},
};
use usernode_tonic_core::proto::{
    InfoSetTask, UserGetTask, UserQueryTask, identity_client::IdentityClient,
};

#[derive(Clone, Copy, Debug)]
enum Compression {
    None,
    Deflate,
    Gzip,
    Zstd,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Deflate => write!(f, "deflate"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

impl From<Compression> for Option<CompressionEncoding> {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => None,
            Compression::Deflate => Some(CompressionEncoding::Deflate),
            Compression::Gzip => Some(CompressionEncoding::Gzip),
            Compression::Zstd => Some(CompressionEncoding::Zstd),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Rpc {
    UserGet,
    UserQuery,
    InfoSet,
}

impl fmt::Display for Rpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rpc::UserGet => write!(f, "user_get"),
            Rpc::UserQuery => write!(f, "user_query"),
            Rpc::InfoSet => write!(f, "info_set"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct GrpcBenchParams {
    rpc: Rpc,
    concurrency: usize,
    compression: Compression,
}

fn grpc_bench(c: &mut Criterion) {
    let uri = Uri::try_from("http://127.0.0.1:50051").expect("Invalid URI");
    // Start the server. This may require a full compilation so set the timeout
    // high. Without MONGODB_URI the server keeps everything in memory.
    let mut server = Command::new("cargo")
        .args([
            "run",
            "--bin",
            "usernode-tonic-server",
            "--release",
            "--features",
            "tracing",
            "--",
            "--server-addr",
            "127.0.0.1:50051",
        ])
        .env("USERNODE_SECRET", "bench-secret")
        .env_remove("MONGODB_URI")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("Failed to start usernode-tonic-server");
    wait_for_port(uri.authority().expect("missing authority").as_str(), 300);

    let rpc_cases = [Rpc::UserGet, Rpc::UserQuery, Rpc::InfoSet];
    let concurrency_cases = [1, 4, 16, 64];
    let compression_cases = [Compression::None, Compression::Zstd, Compression::Gzip];

    // Generate cartesian product of all param combinations
    let mut cases = Vec::new();
    for &rpc in &rpc_cases {
        for &concurrency in &concurrency_cases {
            for &compression in &compression_cases {
                cases.push(GrpcBenchParams {
                    rpc,
                    concurrency,
                    compression,
                });
            }
        }
    }
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    for params in &cases {
        let mut group = c.benchmark_group(format!("grpc/{}", params.rpc));
        group.throughput(Throughput::Elements(params.concurrency as u64));

        group.bench_function(
            format!("conc/{}/comp/{}", params.concurrency, params.compression),
            |b| {
                b.to_async(&rt).iter_custom(|iters| {
                    let uri = uri.clone();
                    async move {
                        let channel = Channel::builder(uri)
                            .connect()
                            .await
                            .expect("Failed to connect to server");

                        let start = Instant::now();

                        for iter in 0..iters {
                            run_grpc_bench(&channel, params, iter).await;
                        }

                        start.elapsed()
                    }
                });
            },
        );

        group.finish();
    }

    if server.kill().is_err() {
        eprintln!("failed to kill server");
    }
}

async fn run_grpc_bench(channel: &Channel, params: &GrpcBenchParams, iter: u64) {
    let mut tasks = FuturesUnordered::new();

    for task in 0..params.concurrency {
        let channel = channel.clone();
        let compression = params.compression;
        let rpc = params.rpc;

        tasks.push(tokio::spawn(async move {
            let mut client = IdentityClient::new(channel);
            if let Some(encoding) = compression.into() {
                client = client.accept_compressed(encoding).send_compressed(encoding)
            }

            // A small pool of names: most calls find an existing user, the
            // first touch of each name creates it.
            let name = format!("bench-{}", (iter as usize * 31 + task) % 1024);
            let errno = match rpc {
                Rpc::UserGet => {
                    let reply = client
                        .user_get(UserGetTask {
                            name,
                            auto_create: true,
                            ..Default::default()
                        })
                        .await
                        .expect("user_get failed")
                        .into_inner();
                    black_box(reply.user);
                    reply.errno
                }
                Rpc::UserQuery => {
                    let reply = client
                        .user_query(UserQueryTask {
                            p: 1,
                            n: 20,
                            q: "bench-1".into(),
                        })
                        .await
                        .expect("user_query failed")
                        .into_inner();
                    black_box(reply.items);
                    reply.errno
                }
                Rpc::InfoSet => {
                    let reply = client
                        .info_set(InfoSetTask {
                            uid: name,
                            key: "bench".into(),
                            info: format!(r#"{{"iter":{iter},"task":{task}}}"#),
                        })
                        .await
                        .expect("info_set failed")
                        .into_inner();
                    black_box(reply.info);
                    reply.errno
                }
            };
            assert_eq!(errno, 200, "{rpc} answered errno {errno}");
        }));
    }

    // Wait for all tasks to complete
    while let Some(res) = tasks.next().await {
        res.unwrap();
    }
}

pub fn wait_for_port(addr: &str, timeout_secs: u64) {
    let start = Instant::now();
    while start.elapsed().as_secs() < timeout_secs {
        if TcpStream::connect(addr).is_ok() {
            return;
        }
        thread::sleep(Duration::from_millis(100));
    }
    panic!("Server did not start listening on {}", addr);
}

criterion_group!(grpc_benches, grpc_bench);
criterion_main!(grpc_benches);
