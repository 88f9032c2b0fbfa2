fn main() {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile(
            &["proto/monitor.proto", "proto/agent.proto"],
            &["proto"],
        )
        .unwrap_or_else(|e| panic!("fleet protobuf compilation failed: {}", e));
}
