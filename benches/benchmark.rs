use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use plsa_topics::{Corpus, Inference, PlsaModel, TrainConfig, Trainer, Vocabulary};

const VOCABULARY: usize = 2_000;
const DOCUMENTS: usize = 500;
const DOCUMENT_LENGTH: usize = 200;
const TOPICS: usize = 16;

// skewed synthetic corpus: low ids are far more common than high ones
fn synthetic() -> (Vocabulary, Corpus) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut vocab = Vocabulary::new();
    for i in 0..VOCABULARY {
        vocab.insert(&format!("w{i}"), (VOCABULARY - i) as u64);
    }
    let docs: Vec<Vec<u32>> = (0..DOCUMENTS)
        .map(|_| {
            (0..DOCUMENT_LENGTH)
                .map(|_| {
                    let u: f64 = rng.gen();
                    ((u * u) * VOCABULARY as f64) as u32
                })
                .collect()
        })
        .collect();
    (vocab, Corpus::from_documents(&docs))
}

fn em_benchmark(c: &mut Criterion) {
    let (vocab, corpus) = synthetic();
    let dir = tempfile::tempdir().expect("temp dir");
    let model_path = dir.path().join("bench.plsa");

    let config = TrainConfig {
        topics: TOPICS,
        max_iterations: 1,
        ..TrainConfig::default()
    };
    let trainer = Trainer::new(config.clone()).expect("trainer");

    c.bench_function("em_iteration", |b| {
        b.iter(|| {
            let mut model = PlsaModel::random(vocab.clone(), TOPICS, config.noise, 0, config.seed)
                .expect("model");
            trainer.train(&mut model, &corpus, &model_path).expect("train")
        });
    });

    let mut model =
        PlsaModel::random(vocab.clone(), TOPICS, config.noise, 0, config.seed).expect("model");
    trainer.train(&mut model, &corpus, &model_path).expect("train");
    let inference = Inference::new(&model, 20);

    c.bench_function("infer_corpus", |b| {
        b.iter(|| {
            inference.run(&corpus, &Default::default()).expect("infer")
        });
    });
}

criterion_group!(benches, em_benchmark);
criterion_main!(benches);
