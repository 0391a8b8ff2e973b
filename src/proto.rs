//! Generated bindings for the Speech-to-Text v1 streaming surface.

pub mod google {
    pub mod rpc {
        include!(concat!(env!("OUT_DIR"), "/google.rpc.rs"));
    }

    pub mod cloud {
        pub mod speech {
            pub mod v1 {
                include!(concat!(env!("OUT_DIR"), "/google.cloud.speech.v1.rs"));
            }
        }
    }
}

pub use google::cloud::speech::v1 as speech;
