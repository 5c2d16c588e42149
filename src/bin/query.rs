
use std::{env, error::Error, fs::File, io::{self, BufRead}};
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;
use w2v_debias::files_handling::read_input;
use w2v_debias::{EmbeddingError, Similarity, Vocab};
use ndarray::Array2;


// checks on trained vectors, run independently of the main pipeline:
// the k most similar words to a given word,
// the k best completions of a word analogy.

const K: usize = 10;

fn main() -> Result<(), Box<dyn Error>> {

    let subscriber = FmtSubscriber::builder().with_max_level(tracing::Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // arguments to this executable should be:
    // a letter selector: "a" for analogies, "b" for word similarity
    // path to input based on selector (quads or singles)
    // path to trained vecs, without the .npy extension
    // path to the vocabulary, without the .json extension
    // example: ... a Input/analogies.txt Output/cbow_vecs Output/words
    let args: Vec<String> = env::args().collect();
    if args.len() != 5 {
        return Err(EmbeddingError::invalid_parameter("expected a selector, an input file, a vecs path and a vocab path").into());
    }
    let selector = args[1].as_str();
    if !["a", "b"].contains(&selector) {
        return Err(EmbeddingError::invalid_parameter(format!("unrecognized pattern in first argument {}", selector)).into());
    }

    let lines = io::BufReader::new(File::open(&args[2])?)
        .lines()
        .collect::<Result<Vec<String>, io::Error>>()?;

    let w: Array2<f32> = read_input(&args[3])?;
    let vocab: Vocab = read_input(&args[4])?;
    let sim_obj = Similarity::new(w.view(), &vocab)?;

    if selector == "a" {
        // each line holds a quartet separated by spaces, e.g. "king queen man woman"
        let inputs = lines
            .iter()
            .map(|line| line.split_whitespace().map(|x| x.to_string()).collect::<Vec<String>>())
            .filter(|quartet| !quartet.is_empty())
            .collect::<Vec<Vec<String>>>();
        run_analogies(&inputs, K, &sim_obj)?;
    } else {
        // one token per line
        let inputs = lines.into_iter().filter(|l| !l.trim().is_empty()).collect::<Vec<String>>();
        run_similarity(&inputs, K, &sim_obj)?;
    }

    Ok(())
}


fn run_analogies(inputs: &[Vec<String>], k: usize, similarity_object: &Similarity) -> Result<(), Box<dyn Error>> {

    // a is to b as c is to d:
    // queen - king + man ? woman

    for input in inputs {

        if input.len() != 4 {
            warn!("skipping line {:?}, expected 4 words", input);
            continue;
        }

        let source = [input[1].as_str(), input[0].as_str(), input[2].as_str()];
        let target = input[3].as_str();

        let analogies = match similarity_object.word_analogy(source, k) {
            Ok(analogies) => analogies,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        let mut found_target = false;
        for (i, analogy) in analogies.iter().enumerate() {
            info!("{} : {} - {} + {} ? {}", i, source[0], source[1], source[2], analogy);
            if analogy == target {
                found_target = true;
                info!("found target '{}' analogy in place {}", target, 1 + i);
            }
        }

        if !found_target {
            info!("target '{}' was not found within the first {} analogies", target, k);
        }
    }
    Ok(())
}

fn run_similarity(inputs: &[String], k: usize, similarity_object: &Similarity) -> Result<(), Box<dyn Error>> {

    for token in inputs {

        info!("searching {} most similar words to {}", k, token);
        match similarity_object.retrieve_similar_words(token, k) {
            Ok(similarities) => {
                for (i, similar_token) in similarities.iter().enumerate() {
                    info!("{} : {} ? {}", i, token, similar_token);
                }
            }
            Err(e) => warn!("{}", e),
        }
    }

    Ok(())
}
