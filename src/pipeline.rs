
// imports
use crate::config::files_handling::{
    load_datasets, read_gender_attribute_words, read_glove_embeddings, read_professions, save_output,
};
use crate::config::{Config, JsonBias, JsonTypes};
use crate::debias::hard_debias;
use crate::error::{EmbeddingError, Result};
use crate::measure::{compute_direct_bias, compute_extreme_words};
use crate::model::{ModelKind, SharedEmbedding};
use crate::similarity::Similarity;
use crate::subspace::compute_gender_subspace;
use crate::train::{train, TrainingPairs};
use crate::vocab::{tokenize_w2v, Vocab};
use crate::weat::permutation_test;
use crate::window::{cbow_preprocessing, skipgram_preprocessing};

use rayon::ThreadPoolBuilder;
use std::time::Instant;
use tracing::{info, warn};

// exact WEAT enumeration gets slow beyond this many target words
const WEAT_TARGET_WARNING: usize = 20;

const QUERY_WORD: &str = "man";
const ANALOGY: [&str; 3] = ["man", "woman", "girl"];

pub struct Pipeline {}

impl Pipeline {

    // runs the main procedure of 3 steps -
    // -> configuration of arguments
    // -> word2vec training and retrieval (CBOW and skip-gram)
    // -> bias analysis of pretrained vectors, if configured

    pub fn run(args: &[String]) -> Result<()> {

        info!("building parameters...");
        let params = Config::new(args)?.get_params();
        info!("{}", params);

        ThreadPoolBuilder::new()
            .num_threads(params.num_threads)
            .build_global()
            .map_err(|e| EmbeddingError::invalid_parameter(e.to_string()))?;

        let timer = Instant::now();
        Pipeline::run_word2vec(&params)?;
        info!("finished word2vec part, took {} seconds ...", timer.elapsed().as_secs());

        match &params.bias {
            Some(bias) => {
                let timer = Instant::now();
                Pipeline::run_bias_analysis(bias)?;
                info!("finished bias analysis, took {} seconds ...", timer.elapsed().as_secs());
            }
            None => info!("no bias parameters given, skipping bias analysis"),
        }

        Ok(())
    }

    fn build_pairs(kind: ModelKind, text_indices: &[Vec<usize>], window_size: usize) -> Result<TrainingPairs> {
        match kind {
            ModelKind::Cbow => {
                let (sources, targets) = cbow_preprocessing(text_indices, window_size)?;
                TrainingPairs::from_windows(&sources, &targets)
            }
            ModelKind::SkipGram => {
                let (sources, targets) = skipgram_preprocessing(text_indices, window_size)?;
                TrainingPairs::from_single(&sources, &targets)
            }
        }
    }

    fn run_word2vec(params: &JsonTypes) -> Result<()> {

        info!("loading datasets from {}...", params.data_dir);
        let (mut train_raw, mut valid_raw) = load_datasets(&params.data_dir)?;
        if let Some(sample_size) = params.sample_size {
            train_raw.truncate(sample_size);
            valid_raw.truncate(sample_size);
        }

        let full_text: Vec<String> = train_raw.premise.into_iter()
            .chain(train_raw.hypothesis)
            .chain(valid_raw.premise)
            .chain(valid_raw.hypothesis)
            .collect();

        // process into indices
        let tokens = tokenize_w2v(&full_text, None, true);
        let vocab = Vocab::build(&tokens, params.num_words);
        let text_indices = vocab.tokens_to_ix(&tokens);
        save_output(&params.output_dir, "words", &vocab)?;

        let train_params = &params.json_train;
        for kind in [ModelKind::Cbow, ModelKind::SkipGram] {

            info!("training {}...", kind);
            let pairs = Pipeline::build_pairs(kind, &text_indices, train_params.window_size)?;
            info!("{} training pairs", pairs.len());

            let mut model = SharedEmbedding::new(kind, vocab.len(), train_params.embed_dim, train_params.seed)?;
            let loss = train(&mut model, &pairs, train_params)?;
            info!("({}) final batch loss: {:.4}", kind, loss);

            let similarity = Similarity::new(model.embedding(), &vocab)?;
            match similarity.retrieve_similar_words(QUERY_WORD, params.top_k) {
                Ok(words) => info!("({}) words similar to '{}' are: {:?}", kind, QUERY_WORD, words),
                Err(e) => warn!("({}) similarity query skipped: {}", kind, e),
            }
            match similarity.word_analogy(ANALOGY, params.top_k) {
                Ok(words) => info!("({}) analogies for {} - {} + {} are: {:?}", kind, ANALOGY[0], ANALOGY[1], ANALOGY[2], words),
                Err(e) => warn!("({}) analogy query skipped: {}", kind, e),
            }

            let name = match kind {
                ModelKind::Cbow => "cbow",
                ModelKind::SkipGram => "skipgram",
            };
            save_output(&params.output_dir, &format!("{}_vecs", name), &model.embedding().to_owned())?;
            save_output(&params.output_dir, name, &model)?;
        }

        Ok(())
    }

    fn run_bias_analysis(bias: &JsonBias) -> Result<()> {

        info!("{}", bias);
        info!("loading glove embeddings...");
        let word_to_embedding = read_glove_embeddings(&bias.glove_file)?;
        info!("loaded {} vectors of dimension {}", word_to_embedding.len(), word_to_embedding.dim());
        let professions = read_professions(&bias.professions_file)?;
        let gender_attribute_words = read_gender_attribute_words(&bias.attribute_words_file)?;

        let base_pairs = vec![
            ("man".to_string(), "woman".to_string()),
            ("boy".to_string(), "girl".to_string()),
        ];
        let gender_subspace = compute_gender_subspace(&word_to_embedding, &base_pairs, bias.n_components)?;

        let max_words = compute_extreme_words(&professions, &word_to_embedding, &gender_subspace, bias.extreme_k, true)?;
        let min_words = compute_extreme_words(&professions, &word_to_embedding, &gender_subspace, bias.extreme_k, false)?;
        info!("max profession words: {:?}", max_words);
        info!("min profession words: {:?}", min_words);

        let direct_bias = compute_direct_bias(&professions, &word_to_embedding, &gender_subspace, bias.direct_bias_c)?;
        info!("DirectBias professions: {:.2}", direct_bias);

        let debiased = hard_debias(&word_to_embedding, &gender_attribute_words, bias.n_components)?;
        let direct_bias_debiased = compute_direct_bias(&professions, &debiased, &gender_subspace, bias.direct_bias_c)?;
        info!("DirectBias professions (debiased): {:.2}", direct_bias_debiased);

        let n_targets = bias.weat_x.len() + bias.weat_y.len();
        if n_targets > WEAT_TARGET_WARNING {
            warn!("{} target words, exact permutation test will be slow", n_targets);
        }
        for (label, table) in [("original", &word_to_embedding), ("debiased", &debiased)] {
            let test = permutation_test(&bias.weat_x, &bias.weat_y, &bias.weat_a, &bias.weat_b, table)?;
            info!(
                "({}) WEAT statistic: {:.4}, p-value: {:.4} over {} partitions",
                label, test.statistic, test.p_value, test.n_partitions
            );
        }

        Ok(())
    }
}
