

use crate::error::{EmbeddingError, Result};
use crate::train::OptimizerKind;

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonTrain {
    pub n_epochs: usize,
    pub batch_size: usize,
    pub embed_dim: usize,
    pub window_size: usize,
    pub optimizer: OptimizerKind,
    pub learning_rate: f32,
    pub seed: u64,
}

impl Default for JsonTrain {
    fn default() -> Self {
        Self {
            n_epochs: 2,
            batch_size: 64,
            embed_dim: 200,
            window_size: 2,
            optimizer: OptimizerKind::Adam,
            learning_rate: 1e-3,
            seed: 2022,
        }
    }
}

impl Display for JsonTrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "training hyper parameters:
        n_epochs: {},
        batch_size: {},
        embed_dim: {},
        window_size: {},
        optimizer: {:?},
        learning_rate: {},
        seed: {}",
        self.n_epochs, self.batch_size, self.embed_dim, self.window_size, self.optimizer, self.learning_rate, self.seed
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonBias {
    pub glove_file: String,
    pub professions_file: String,
    pub attribute_words_file: String,
    pub n_components: usize,
    pub direct_bias_c: f64,
    pub extreme_k: usize,
    pub weat_a: Vec<String>,
    pub weat_b: Vec<String>,
    pub weat_x: Vec<String>,
    pub weat_y: Vec<String>,
}

fn to_strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for JsonBias {
    fn default() -> Self {
        Self {
            glove_file: "data/glove/glove.6B.300d.txt".to_string(),
            professions_file: "data/professions.tsv".to_string(),
            attribute_words_file: "data/gender_attribute_words.json".to_string(),
            n_components: 1,
            direct_bias_c: 0.25,
            extreme_k: 10,
            weat_a: to_strings(&["male", "man", "boy", "brother", "he", "him", "his", "son"]),
            weat_b: to_strings(&["female", "woman", "girl", "sister", "she", "her", "hers", "daughter"]),
            weat_x: to_strings(&["math", "algebra", "geometry", "calculus", "equations", "computation", "numbers", "addition"]),
            weat_y: to_strings(&["poetry", "art", "dance", "literature", "novel", "symphony", "drama", "sculpture"]),
        }
    }
}

impl Display for JsonBias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bias analysis parameters:
        glove_file: {},
        professions_file: {},
        attribute_words_file: {},
        n_components: {},
        direct_bias_c: {},
        extreme_k: {},
        weat target sizes: {} / {}",
        self.glove_file, self.professions_file, self.attribute_words_file, self.n_components,
        self.direct_bias_c, self.extreme_k, self.weat_x.len(), self.weat_y.len()
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JsonTypes {
    pub data_dir: String,
    pub output_dir: String,
    #[serde(default)]
    pub sample_size: Option<usize>,
    #[serde(default = "default_num_words")]
    pub num_words: Option<usize>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    #[serde(flatten)]
    pub json_train: JsonTrain,
    /// the bias analysis is skipped when absent
    #[serde(default)]
    pub bias: Option<JsonBias>,
}

fn default_num_words() -> Option<usize> {
    Some(50000)
}

fn default_top_k() -> usize {
    5
}

fn default_num_threads() -> usize {
    4
}

impl Display for JsonTypes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "using hyper-params:
        data_dir: {}
        output_dir: {}
        sample_size: {:?}
        num_words: {:?}
        top_k: {}
        num_threads: {},
        Using {}",
        self.data_dir, self.output_dir, self.sample_size, self.num_words, self.top_k, self.num_threads, self.json_train)
    }
}

pub struct Config {
    params: JsonTypes
}

impl Config {

    pub fn get_params(&self) -> JsonTypes {
        self.params.clone()
    }

    /// Expects exactly one argument besides the program name: the path to a json file.
    pub fn new(args: &[String]) -> Result<Config> {

        if args.len() != 2 {
            return Err(EmbeddingError::invalid_parameter("input should be a path to json file only"));
        }

        let f = BufReader::new(File::open(&args[1])?);
        let params: JsonTypes = serde_json::from_reader(f)?;
        Config::validated(params)
    }

    pub fn from_json_str(json: &str) -> Result<Config> {
        let params: JsonTypes = serde_json::from_str(json)?;
        Config::validated(params)
    }

    fn validated(params: JsonTypes) -> Result<Config> {
        let train = &params.json_train;
        if train.window_size == 0 || train.batch_size == 0 || train.embed_dim == 0 || train.n_epochs == 0 {
            return Err(EmbeddingError::invalid_parameter("window_size, batch_size, embed_dim and n_epochs must be positive"));
        }
        if params.num_threads == 0 {
            return Err(EmbeddingError::invalid_parameter("num_threads must be positive"));
        }
        if let Some(bias) = &params.bias {
            if bias.weat_x.len() != bias.weat_y.len() {
                return Err(EmbeddingError::size_mismatch("weat_x and weat_y", bias.weat_x.len(), bias.weat_y.len()));
            }
        }
        Ok(Self { params })
    }
}


pub mod files_handling {

    use crate::error::{EmbeddingError, Result};
    use crate::model::SharedEmbedding;
    use crate::table::EmbeddingTable;
    use crate::vocab::Vocab;

    use flate2::read::GzDecoder;
    use ndarray::{Array1, Array2};
    use ndarray_npy::{read_npy, write_npy};
    use serde::Deserialize;
    use std::fs::{self, File};
    use std::io::{BufRead, BufReader, BufWriter, Read};
    use std::path::Path;

    /// One split of the sentence-pair corpus; only the text fields are used.
    #[derive(Clone, Debug, Default, Deserialize)]
    pub struct Split {
        pub premise: Vec<String>,
        pub hypothesis: Vec<String>,
    }

    impl Split {
        pub fn truncate(&mut self, sample_size: usize) {
            self.premise.truncate(sample_size);
            self.hypothesis.truncate(sample_size);
        }
    }

    pub fn load_datasets(data_directory: &str) -> Result<(Split, Split)> {
        let read = |name: &str| -> Result<Split> {
            let f = BufReader::new(File::open(Path::new(data_directory).join(name))?);
            Ok(serde_json::from_reader(f)?)
        };
        Ok((read("train.json")?, read("validation.json")?))
    }

    fn open_maybe_gz(file_path: &str) -> Result<Box<dyn BufRead>> {
        let f = File::open(file_path)?;
        if file_path.ends_with(".gz") {
            Ok(Box::new(BufReader::new(GzDecoder::new(f))))
        } else {
            Ok(Box::new(BufReader::new(f)))
        }
    }

    /// GloVe text format: a word followed by its space separated components, one per line.
    pub fn parse_glove<R: BufRead>(reader: R) -> Result<EmbeddingTable> {
        let mut entries: Vec<(String, Array1<f64>)> = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            let mut parts = line.split_whitespace();
            let word = match parts.next() {
                Some(word) => word.to_string(),
                None => continue,
            };
            let values = parts
                .map(|x| x.parse::<f64>())
                .collect::<std::result::Result<Vec<f64>, _>>()
                .map_err(|e| EmbeddingError::invalid_parameter(format!("line {}: {}", n + 1, e)))?;
            entries.push((word, Array1::from(values)));
        }
        EmbeddingTable::from_entries(entries)
    }

    pub fn read_glove_embeddings(file_path: &str) -> Result<EmbeddingTable> {
        parse_glove(open_maybe_gz(file_path)?)
    }

    /// Profession phrases from the second column of a tab separated file with a header.
    pub fn parse_professions<R: Read>(reader: R) -> Result<Vec<String>> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let mut professions = Vec::new();
        for (n, record) in rdr.records().enumerate() {
            let record = record?;
            match record.get(1) {
                Some(profession) => professions.push(profession.to_string()),
                None => return Err(EmbeddingError::invalid_parameter(format!("row {} has no profession column", n + 1))),
            }
        }
        Ok(professions)
    }

    pub fn read_professions(file_path: &str) -> Result<Vec<String>> {
        parse_professions(File::open(file_path)?)
    }

    pub fn read_gender_attribute_words(file_path: &str) -> Result<Vec<(String, String)>> {
        // json list of [male, female] pairs
        let f = BufReader::new(File::open(file_path)?);
        Ok(serde_json::from_reader(f)?)
    }

    pub fn read_input<R: ReadFile>(file_path: &str) -> Result<R> {
        R::read_file(file_path)
    }

    pub fn save_output<S: SaveFile>(output_dir: &str, file_name: &str, item: &S) -> Result<()> {
        fs::create_dir_all(output_dir)?;
        item.save_file(output_dir, file_name)
    }

    // paths are given without extension, each type adds its own
    pub trait ReadFile: Sized {
        fn read_file(file_path: &str) -> Result<Self>;
    }

    pub trait SaveFile {
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<()>;
    }

    fn out_path(output_dir: &str, file_name: &str, extension: &str) -> String {
        format!("{}/{}.{}", output_dir, file_name, extension)
    }

    impl ReadFile for Array2<f32> {
        fn read_file(file_path: &str) -> Result<Self> {
            Ok(read_npy(file_path.to_string() + ".npy")?)
        }
    }

    impl SaveFile for Array2<f32> {
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<()> {
            write_npy(out_path(output_dir, file_name, "npy"), self)?;
            Ok(())
        }
    }

    impl ReadFile for Vocab {
        fn read_file(file_path: &str) -> Result<Self> {
            let f = BufReader::new(File::open(file_path.to_string() + ".json")?);
            Ok(serde_json::from_reader(f)?)
        }
    }

    impl SaveFile for Vocab {
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<()> {
            let f = BufWriter::new(File::create(out_path(output_dir, file_name, "json"))?);
            serde_json::to_writer(f, self)?;
            Ok(())
        }
    }

    impl ReadFile for SharedEmbedding {
        fn read_file(file_path: &str) -> Result<Self> {
            let f = BufReader::new(File::open(file_path.to_string() + ".bin")?);
            Ok(bincode::deserialize_from(f)?)
        }
    }

    impl SaveFile for SharedEmbedding {
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<()> {
            let mut f = BufWriter::new(File::create(out_path(output_dir, file_name, "bin"))?);
            bincode::serialize_into(&mut f, self)?;
            Ok(())
        }
    }
}


#[cfg(test)]
mod tests {

    use super::files_handling::*;
    use super::*;
    use crate::model::{ModelKind, SharedEmbedding};
    use crate::vocab::Vocab;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use ndarray::{array, Array2};
    use std::io::Write;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = Config::from_json_str(r#"{"data_dir": "data", "output_dir": "Output"}"#).unwrap();
        let params = config.get_params();
        assert_eq!(params.num_words, Some(50000));
        assert_eq!(params.top_k, 5);
        assert_eq!(params.json_train.batch_size, 64);
        assert_eq!(params.json_train.window_size, 2);
        assert_eq!(params.json_train.optimizer, OptimizerKind::Adam);
        assert!(params.bias.is_none());
    }

    #[test]
    fn flat_keys_override_training_defaults() {
        let json = r#"{
            "data_dir": "data", "output_dir": "Output", "sample_size": 2500,
            "n_epochs": 5, "optimizer": "ada_grad", "learning_rate": 0.05,
            "bias": {"n_components": 1, "weat_x": ["a"], "weat_y": ["b"]}
        }"#;
        let params = Config::from_json_str(json).unwrap().get_params();
        assert_eq!(params.sample_size, Some(2500));
        assert_eq!(params.json_train.n_epochs, 5);
        assert_eq!(params.json_train.optimizer, OptimizerKind::AdaGrad);
        let bias = params.bias.unwrap();
        assert_eq!(bias.weat_x, vec!["a".to_string()]);
        assert_eq!(bias.weat_a.len(), 8);
    }

    #[test]
    fn bad_configs_are_rejected() {
        assert!(Config::from_json_str(r#"{"output_dir": "Output"}"#).is_err());
        assert!(Config::from_json_str(r#"{"data_dir": "d", "output_dir": "o", "window_size": 0}"#).is_err());
        assert!(Config::from_json_str(r#"{"data_dir": "d", "output_dir": "o", "n_epochs": 0}"#).is_err());
        assert!(Config::from_json_str(
            r#"{"data_dir": "d", "output_dir": "o", "bias": {"weat_x": ["a", "b"], "weat_y": ["c"]}}"#
        )
        .is_err());
        assert!(Config::new(&["prog".to_string()]).is_err());
    }

    #[test]
    fn glove_plain_and_gzipped() {
        let text = "the 0.1 0.2 0.3\nman 1 0 -1\n\nwoman -1 0 1\n";
        let table = parse_glove(text.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("man").unwrap(), array![1.0, 0.0, -1.0]);

        assert!(parse_glove("bad 0.1 x\n".as_bytes()).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vecs.txt.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap();
        let table = read_glove_embeddings(path.to_str().unwrap()).unwrap();
        assert_eq!(table.get("woman").unwrap(), array![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn professions_and_attribute_words() {
        let tsv = "id\tprofession\tgroup\n0\tnurse\tf\n1\tpolice officer\tm\n";
        assert_eq!(parse_professions(tsv.as_bytes()).unwrap(), vec!["nurse", "police officer"]);
        assert!(parse_professions("id\tprofession\n7\n".as_bytes()).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attrs.json");
        std::fs::write(&path, r#"[["man", "woman"], ["boy", "girl"]]"#).unwrap();
        let pairs = read_gender_attribute_words(path.to_str().unwrap()).unwrap();
        assert_eq!(pairs[1], ("boy".to_string(), "girl".to_string()));
    }

    #[test]
    fn datasets_are_read_and_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let split = r#"{"premise": ["a b", "c d"], "hypothesis": ["e", "f"], "label": [0, 1]}"#;
        std::fs::write(dir.path().join("train.json"), split).unwrap();
        std::fs::write(dir.path().join("validation.json"), split).unwrap();
        let (mut train, valid) = load_datasets(dir.path().to_str().unwrap()).unwrap();
        train.truncate(1);
        assert_eq!(train.premise, vec!["a b"]);
        assert_eq!(valid.hypothesis.len(), 2);
    }

    #[test]
    fn saved_outputs_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("Output");
        let out = out.to_str().unwrap();

        let w: Array2<f32> = array![[1.0, 2.0], [3.0, 4.0]];
        save_output(out, "vecs", &w).unwrap();
        let read: Array2<f32> = read_input(&format!("{}/vecs", out)).unwrap();
        assert_eq!(read, w);

        let vocab = Vocab::from_counts(&[("cat".to_string(), 3)], None);
        save_output(out, "words", &vocab).unwrap();
        let read: Vocab = read_input(&format!("{}/words", out)).unwrap();
        assert_eq!(read.index_of("cat").unwrap(), 1);

        let model = SharedEmbedding::new(ModelKind::Cbow, 3, 2, 1).unwrap();
        save_output(out, "cbow", &model).unwrap();
        let read: SharedEmbedding = read_input(&format!("{}/cbow", out)).unwrap();
        assert_eq!(read.kind(), ModelKind::Cbow);
        assert_eq!(read.embedding(), model.embedding());
    }
}
