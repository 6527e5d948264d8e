use burn::backend::{Autodiff, NdArray};
use digit_trainer::{run_pipeline, Session, TrainingConfig};
use tracing_subscriber::EnvFilter;

type TrainBackend = Autodiff<NdArray<f32>>;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    println!("=== MNIST digit classifier ===\n");

    let device = Default::default();
    let session = Session::<TrainBackend>::new(TrainingConfig::default(), device);

    if let Err(e) = run_pipeline(&session) {
        log::error!("Pipeline failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
