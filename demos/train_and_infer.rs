use plsa_topics::{
    infer, train, FeatureSinks, InferConfig, TrainConfig, Vocabulary, WordTopicSource,
};

fn main() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("demo.plsa");

    // two obvious themes
    let docs: Vec<Vec<&str>> = [
        "rust cargo crate borrow rust compiler",
        "cargo crate rust trait borrow",
        "ocean wave tide ocean beach",
        "beach sand wave tide",
        "rust compiler trait crate",
        "tide ocean sand wave",
    ]
    .iter()
    .map(|line| line.split_whitespace().collect())
    .collect();

    // train
    let vocab = Vocabulary::from_documents(&docs);
    let config = TrainConfig {
        topics: 2,
        max_iterations: 20,
        ..TrainConfig::default()
    };
    let report = train(&docs, WordTopicSource::Fresh(vocab), &model_path, config).unwrap();
    println!("log-likelihood per iteration: {:?}", report.log_likelihoods);

    // infer on unseen documents, writing word features next to the model
    let queries = vec![vec!["crate", "borrow", "compiler"], vec!["wave", "beach"]];
    let sinks = FeatureSinks {
        topic_features: None,
        word_features: Some(dir.path().join("words")),
    };
    let outcomes = infer(&queries, &model_path, &InferConfig::default(), &sinks).unwrap();
    for (query, outcome) in queries.iter().zip(&outcomes) {
        println!(
            "{:?} -> {:?} ({} passes)",
            query,
            outcome.estimate.topics(),
            outcome.iterations
        );
    }
    let top = std::fs::read_to_string(dir.path().join("words.001")).unwrap();
    println!("word features of the first query:\n{top}");
}
