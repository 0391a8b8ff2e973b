fn main() {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .bytes(["."])
        .compile_protos(
            &[
                "proto/google/rpc/status.proto",
                "proto/google/cloud/speech/v1/cloud_speech.proto",
            ],
            &["proto"],
        ) // proto dir relative to project root
        .expect("failed to compile speech gRPC protos");
}
