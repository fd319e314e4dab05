// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{MisfitConfig, MisfitNode, RankingRequest};
use misfit_core::{
    BinaryBuffer, CaseStorage, Chi2Matrix, Chi2Request, MisfitError, NodeId, ObservationSource,
    ScalarAccessor, StateKind,
};
use misfit_rank::{MemberScores, Ranking};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Case record the populated table is persisted under.
pub const MISFIT_CASE_RECORD: &str = "misfit";

/// Misfit for a whole ensemble, plus the rankings derived from it.
///
/// The table borrows the observation source it was populated from and
/// never outlives it.
pub struct MisfitTable<'a> {
    history_length: usize,
    ensemble: Vec<MisfitNode>,
    rankings: BTreeMap<String, Ranking>,
    observations: &'a dyn ObservationSource,
    case_id: String,
}

impl fmt::Debug for MisfitTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MisfitTable")
            .field("case_id", &self.case_id)
            .field("history_length", &self.history_length)
            .field("ensemble", &self.ensemble)
            .field("rankings", &self.rankings.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<'a> MisfitTable<'a> {
    fn alloc_empty(
        observations: &'a dyn ObservationSource,
        case_id: String,
        history_length: usize,
    ) -> Self {
        Self {
            history_length,
            ensemble: Vec::new(),
            rankings: BTreeMap::new(),
            observations,
            case_id,
        }
    }

    /// Builds the table for `ens_size` members, evaluates every observation
    /// key and persists the result to `fs` under [`MISFIT_CASE_RECORD`].
    ///
    /// Nothing is written unless the whole evaluation pass succeeds.
    pub fn alloc(
        config: &MisfitConfig,
        fs: &dyn CaseStorage,
        history_length: usize,
        ens_size: usize,
        observations: &'a dyn ObservationSource,
    ) -> Result<Self, MisfitError> {
        let mut table = Self::alloc_empty(observations, fs.mount_point().to_string(), history_length);
        table.set_ens_size(ens_size);
        table.update(config)?;

        let mut buffer = BinaryBuffer::with_capacity(1024);
        table.buffer_fwrite(&mut buffer)?;
        fs.write_case_file(MISFIT_CASE_RECORD, buffer.as_bytes())?;
        info!(
            case_id = %table.case_id,
            ens_size,
            history_length,
            bytes = buffer.len(),
            "misfit table persisted"
        );
        Ok(table)
    }

    /// Folds one chi-square evaluation per observation key into the nodes.
    pub(crate) fn update(&mut self, config: &MisfitConfig) -> Result<(), MisfitError> {
        let ens_size = self.ensemble.len();
        let steps = self.history_length + 1;
        let mut chi2 = Chi2Matrix::zeros(steps, ens_size)?;
        let mut valid = vec![true; ens_size];

        for obs_key in self.observations.observation_keys() {
            debug!(obs_key = %obs_key, "evaluating misfit for observation");
            valid.fill(true);
            chi2.fill(0.0);
            let request = Chi2Request {
                obs_key: &obs_key,
                step_from: 0,
                step_to: self.history_length,
                member_from: 0,
                member_to: ens_size,
                state: config.compare_state,
            };
            self.observations
                .evaluate_chi2(&request, &mut valid, &mut chi2)?;

            for (iens, node) in self.ensemble.iter_mut().enumerate() {
                if !valid[iens] && node.is_valid() {
                    warn!(iens, obs_key = %obs_key, "member has no usable data; excluded from misfit");
                    node.set_valid(false);
                }
                if node.is_valid() {
                    node.update(&obs_key, self.history_length, iens, &chi2)?;
                }
            }
        }
        Ok(())
    }

    /// Reconciles the ensemble with a new size.
    ///
    /// Growing discards **all** existing misfit and recreates `ens_size`
    /// fresh nodes; shrinking only drops the tail. The asymmetry is
    /// surprising but callers rely on "grow resets everything".
    pub fn set_ens_size(&mut self, ens_size: usize) {
        if ens_size > self.ensemble.len() {
            self.ensemble = (0..ens_size).map(MisfitNode::new).collect();
        } else {
            self.ensemble.truncate(ens_size);
        }
    }

    pub fn ens_size(&self) -> usize {
        self.ensemble.len()
    }

    pub fn history_length(&self) -> usize {
        self.history_length
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn observations(&self) -> &'a dyn ObservationSource {
        self.observations
    }

    pub fn node(&self, iens: usize) -> Option<&MisfitNode> {
        self.ensemble.get(iens)
    }

    pub fn nodes(&self) -> &[MisfitNode] {
        &self.ensemble
    }

    fn install_ranking(
        &mut self,
        ranking_key: &str,
        mut ranking: Ranking,
        filename: Option<&Path>,
    ) -> Result<(), MisfitError> {
        ranking.init_sort();
        if let Some(filename) = filename {
            ranking.fprintf(filename)?;
        }
        info!(
            ranking_key,
            members = ranking.len(),
            valid = ranking.valid_count(),
            "ranking stored"
        );
        self.rankings.insert(ranking_key.to_string(), ranking);
        Ok(())
    }

    /// Ranks members by misfit summed over `sort_keys` and the inclusive
    /// step window `[step1, step2]`.
    ///
    /// Each key may appear once; a repeated key is `InvalidInput` rather
    /// than being counted twice in the totals. When `filename` is given the
    /// report is written before the ranking is stored, so a failed write
    /// leaves any earlier ranking under `ranking_key` in place.
    pub fn create_ranking<S: AsRef<str>>(
        &mut self,
        sort_keys: &[S],
        step1: usize,
        step2: usize,
        ranking_key: &str,
        filename: Option<&Path>,
    ) -> Result<(), MisfitError> {
        let mut seen = BTreeSet::new();
        for key in sort_keys {
            if !seen.insert(key.as_ref()) {
                return Err(MisfitError::invalid_input(format!(
                    "sort key '{}' is listed more than once",
                    key.as_ref()
                )));
            }
        }

        let mut ranking = Ranking::new();
        for (iens, node) in self.ensemble.iter().enumerate() {
            if !node.is_valid() {
                ranking.iset_invalid(iens)?;
                continue;
            }
            let mut scores = MemberScores::new();
            let mut total = 0.0;
            for key in sort_keys {
                let obs_key = key.as_ref();
                let value = node.vector(obs_key)?.eval(step1, step2)?;
                scores.insert(obs_key.to_string(), value);
                total += value;
            }
            ranking.iset(iens, scores, total)?;
        }
        self.install_ranking(ranking_key, ranking, filename)
    }

    /// Runs a validated [`RankingRequest`].
    pub fn apply_ranking_request(&mut self, request: &RankingRequest) -> Result<(), MisfitError> {
        request.validate(self.history_length)?;
        self.create_ranking(
            &request.sort_keys,
            request.step1,
            request.step2,
            &request.ranking_key,
            request.report.as_deref(),
        )
    }

    /// Parses a JSON [`RankingRequest`] and runs it.
    #[cfg(feature = "serde")]
    pub fn apply_ranking_request_json(&mut self, request_json: &str) -> Result<(), MisfitError> {
        let request: RankingRequest = serde_json::from_str(request_json)
            .map_err(|err| MisfitError::invalid_input(format!("invalid ranking request JSON: {err}")))?;
        self.apply_ranking_request(&request)
    }

    /// Ranks members by one externally stored scalar each.
    ///
    /// Members without a value are invalid; the per-member breakdown holds
    /// the single entry `user_key -> value`.
    #[allow(clippy::too_many_arguments)]
    pub fn create_data_ranking(
        &mut self,
        ens_size: usize,
        accessor: &dyn ScalarAccessor,
        user_key: &str,
        key_index: &str,
        step: usize,
        state: StateKind,
        ranking_key: &str,
        filename: Option<&Path>,
    ) -> Result<(), MisfitError> {
        let mut ranking = Ranking::new();
        for iens in 0..ens_size {
            let node_id = NodeId::new(step, iens, state);
            match accessor.get_value(key_index, node_id)? {
                Some(raw) => {
                    let value = raw.as_f64()?;
                    let scores = MemberScores::from([(user_key.to_string(), value)]);
                    ranking.iset(iens, scores, value)?;
                }
                None => ranking.iset_invalid(iens)?,
            }
        }
        self.install_ranking(ranking_key, ranking, filename)
    }

    pub fn has_ranking(&self, ranking_key: &str) -> bool {
        self.rankings.contains_key(ranking_key)
    }

    pub fn ranking(&self, ranking_key: &str) -> Option<&Ranking> {
        self.rankings.get(ranking_key)
    }

    fn require_ranking(&self, ranking_key: &str) -> Result<&Ranking, MisfitError> {
        self.rankings
            .get(ranking_key)
            .ok_or_else(|| MisfitError::missing_key(format!("no ranking named '{ranking_key}'")))
    }

    pub fn get_ranking_permutation(&self, ranking_key: &str) -> Result<&[usize], MisfitError> {
        self.require_ranking(ranking_key)?.permutation()
    }

    /// Prints the ranking summary to stdout.
    pub fn display_ranking(&self, ranking_key: &str) -> Result<(), MisfitError> {
        self.require_ranking(ranking_key)?.display()
    }

    pub fn fprintf_ranking(
        &self,
        ranking_key: &str,
        filename: impl AsRef<Path>,
    ) -> Result<(), MisfitError> {
        self.require_ranking(ranking_key)?.fprintf(filename)
    }

    /// Drops every ranking and every node.
    pub fn clear(&mut self) {
        self.rankings.clear();
        self.ensemble.clear();
    }

    /// Serializes provenance and nodes; rankings are not persisted.
    pub fn buffer_fwrite(&self, buffer: &mut BinaryBuffer) -> Result<(), MisfitError> {
        buffer.write_string(&self.case_id)?;
        buffer.write_len(self.history_length)?;
        buffer.write_len(self.ensemble.len())?;
        for node in &self.ensemble {
            node.buffer_fwrite(buffer)?;
        }
        Ok(())
    }

    pub fn fwrite<W: Write>(&self, stream: &mut W) -> Result<(), MisfitError> {
        let mut buffer = BinaryBuffer::with_capacity(1024);
        self.buffer_fwrite(&mut buffer)?;
        buffer.stream_write(stream)
    }

    /// Restores a table written by [`MisfitTable::buffer_fwrite`], rejecting
    /// inconsistent shapes and trailing bytes.
    pub fn buffer_fread_alloc(
        buffer: &mut BinaryBuffer,
        observations: &'a dyn ObservationSource,
    ) -> Result<Self, MisfitError> {
        let case_id = buffer.read_string()?;
        let history_length = buffer.read_len("history_length")?;
        let ens_size = buffer.read_len("ensemble size")?;

        let mut table = Self::alloc_empty(observations, case_id, history_length);
        let mut ensemble = Vec::new();
        for iens in 0..ens_size {
            let node = MisfitNode::buffer_fread_alloc(buffer)?;
            if node.iens() != iens {
                return Err(MisfitError::malformed_buffer(format!(
                    "node at position {iens} is tagged iens={}",
                    node.iens()
                )));
            }
            for obs_key in node.observation_keys() {
                let len = node.vector(obs_key)?.len();
                if len != history_length + 1 {
                    return Err(MisfitError::size_mismatch(format!(
                        "member {iens} key '{obs_key}' has {len} samples; history_length={history_length} needs {}",
                        history_length + 1
                    )));
                }
            }
            ensemble.push(node);
        }
        if buffer.remaining() != 0 {
            return Err(MisfitError::malformed_buffer(format!(
                "{} trailing bytes after {ens_size} members",
                buffer.remaining()
            )));
        }
        table.ensemble = ensemble;
        Ok(table)
    }

    pub fn fread_alloc(
        filename: impl AsRef<Path>,
        observations: &'a dyn ObservationSource,
    ) -> Result<Self, MisfitError> {
        let filename = filename.as_ref();
        let bytes = std::fs::read(filename).map_err(|err| {
            MisfitError::storage_read(format!(
                "failed reading misfit table '{}': {err}",
                filename.display()
            ))
        })?;
        Self::buffer_fread_alloc(&mut BinaryBuffer::from_bytes(bytes), observations)
    }

    /// Loads the table persisted by [`MisfitTable::alloc`] for this case.
    pub fn load_case(
        fs: &dyn CaseStorage,
        observations: &'a dyn ObservationSource,
    ) -> Result<Self, MisfitError> {
        let bytes = fs.read_case_file(MISFIT_CASE_RECORD)?;
        Self::buffer_fread_alloc(&mut BinaryBuffer::from_bytes(bytes), observations)
    }
}

#[cfg(test)]
mod tests {
    use super::{MISFIT_CASE_RECORD, MisfitTable};
    use crate::{MemoryStorage, MisfitConfig};
    use misfit_core::{
        BinaryBuffer, CaseStorage, Chi2Matrix, Chi2Request, MisfitError, NodeId, NodeValue,
        ObservationSource, ScalarAccessor, StateKind,
    };
    use std::cell::RefCell;

    /// Fixed chi2 per key; `invalid` lists members flagged by that key.
    struct FixedSource {
        keys: Vec<(String, Vec<Vec<f64>>, Vec<usize>)>,
        requests: RefCell<Vec<(String, StateKind)>>,
    }

    impl FixedSource {
        fn new(keys: Vec<(&str, Vec<Vec<f64>>, Vec<usize>)>) -> Self {
            Self {
                keys: keys
                    .into_iter()
                    .map(|(key, rows, invalid)| (key.to_string(), rows, invalid))
                    .collect(),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl ObservationSource for FixedSource {
        fn observation_keys(&self) -> Vec<String> {
            self.keys.iter().map(|(key, _, _)| key.clone()).collect()
        }

        fn evaluate_chi2(
            &self,
            request: &Chi2Request<'_>,
            valid: &mut [bool],
            out: &mut Chi2Matrix,
        ) -> Result<(), MisfitError> {
            self.requests
                .borrow_mut()
                .push((request.obs_key.to_string(), request.state));
            let (_, rows, invalid) = self
                .keys
                .iter()
                .find(|(key, _, _)| key == request.obs_key)
                .ok_or_else(|| MisfitError::evaluation(format!("unknown key {}", request.obs_key)))?;
            for step in request.step_from..=request.step_to {
                for iens in request.member_from..request.member_to {
                    out.set(step, iens, rows[step][iens]);
                }
            }
            for iens in invalid {
                valid[*iens] = false;
            }
            Ok(())
        }
    }

    struct FailingSource;

    impl ObservationSource for FailingSource {
        fn observation_keys(&self) -> Vec<String> {
            vec!["WOPR:P1".to_string()]
        }

        fn evaluate_chi2(
            &self,
            request: &Chi2Request<'_>,
            _valid: &mut [bool],
            _out: &mut Chi2Matrix,
        ) -> Result<(), MisfitError> {
            Err(MisfitError::evaluation(format!(
                "no simulated data for {}",
                request.obs_key
            )))
        }
    }

    struct FailingStorage;

    impl CaseStorage for FailingStorage {
        fn mount_point(&self) -> &str {
            "readonly://case"
        }

        fn write_case_file(&self, label: &str, _bytes: &[u8]) -> Result<(), MisfitError> {
            Err(MisfitError::storage_write(format!("{label}: read-only case")))
        }

        fn read_case_file(&self, label: &str) -> Result<Vec<u8>, MisfitError> {
            Err(MisfitError::storage_read(format!("{label}: read-only case")))
        }
    }

    struct PoroAccessor;

    impl ScalarAccessor for PoroAccessor {
        fn get_value(
            &self,
            key_index: &str,
            node_id: NodeId,
        ) -> Result<Option<NodeValue>, MisfitError> {
            assert_eq!(key_index, "PORO:1,1,1");
            Ok(match node_id.iens {
                0 => Some(NodeValue::F64(0.30)),
                1 => None,
                2 => Some(NodeValue::F32(0.25)),
                _ => Some(NodeValue::I32(1)),
            })
        }
    }

    fn wopr_source() -> FixedSource {
        FixedSource::new(vec![(
            "WOPR:P1",
            vec![vec![1.0, 2.0, 3.0], vec![1.0, 1.0, 1.0], vec![2.0, 2.0, 2.0]],
            vec![1],
        )])
    }

    fn two_key_source() -> FixedSource {
        FixedSource::new(vec![
            (
                "WWCT:P2",
                vec![vec![0.5, 0.0, 1.0], vec![0.5, 0.0, 1.0], vec![0.5, 0.0, 1.0]],
                vec![],
            ),
            (
                "WOPR:P1",
                vec![vec![1.0, 2.0, 3.0], vec![1.0, 1.0, 1.0], vec![2.0, 2.0, 2.0]],
                vec![2],
            ),
        ])
    }

    #[test]
    fn alloc_populates_vectors_and_skips_invalid_members() {
        let source = wopr_source();
        let storage = MemoryStorage::new("mem://default");
        let table = MisfitTable::alloc(&MisfitConfig::default(), &storage, 2, 3, &source)
            .expect("alloc should succeed");

        assert_eq!(table.case_id(), "mem://default");
        assert_eq!(table.ens_size(), 3);
        let node0 = table.node(0).expect("member 0 exists");
        let node1 = table.node(1).expect("member 1 exists");
        let node2 = table.node(2).expect("member 2 exists");
        assert_eq!(
            node0.vector("WOPR:P1").expect("vector").samples(),
            &[1.0, 1.0, 2.0]
        );
        assert!(!node1.is_valid());
        assert!(!node1.has_vector("WOPR:P1"));
        assert_eq!(
            node2.vector("WOPR:P1").expect("vector").samples(),
            &[3.0, 1.0, 2.0]
        );
        assert!(storage.contains(MISFIT_CASE_RECORD));
        assert_eq!(
            source.requests.borrow().as_slice(),
            &[("WOPR:P1".to_string(), StateKind::Forecast)]
        );
    }

    #[test]
    fn invalidation_sticks_for_later_keys_but_keeps_earlier_vectors() {
        let source = two_key_source();
        let storage = MemoryStorage::new("mem://two");
        let table = MisfitTable::alloc(&MisfitConfig::default(), &storage, 2, 3, &source)
            .expect("alloc should succeed");

        let node2 = table.node(2).expect("member 2 exists");
        assert!(!node2.is_valid());
        assert!(node2.has_vector("WWCT:P2"), "stale vector from earlier key stays");
        assert!(!node2.has_vector("WOPR:P1"));

        let node0 = table.node(0).expect("member 0 exists");
        let keys: Vec<&str> = node0.observation_keys().collect();
        assert_eq!(keys, vec!["WWCT:P2", "WOPR:P1"]);
    }

    #[test]
    fn alloc_uses_configured_compare_state() {
        let source = wopr_source();
        let storage = MemoryStorage::new("mem://analyzed");
        let config = MisfitConfig {
            compare_state: StateKind::Analyzed,
        };
        MisfitTable::alloc(&config, &storage, 2, 3, &source).expect("alloc should succeed");
        assert_eq!(source.requests.borrow()[0].1, StateKind::Analyzed);
    }

    #[test]
    fn failed_evaluation_persists_nothing() {
        let storage = MemoryStorage::new("mem://failing");
        let err = MisfitTable::alloc(&MisfitConfig::default(), &storage, 2, 3, &FailingSource)
            .expect_err("evaluation failure must propagate");
        assert!(matches!(err, MisfitError::Evaluation(_)));
        assert!(!storage.contains(MISFIT_CASE_RECORD));
    }

    #[test]
    fn failed_storage_write_is_reported() {
        let source = wopr_source();
        let err = MisfitTable::alloc(&MisfitConfig::default(), &FailingStorage, 2, 3, &source)
            .expect_err("write failure must propagate");
        assert!(matches!(err, MisfitError::StorageWriteFailure(_)));
    }

    #[test]
    fn set_ens_size_grow_discards_existing_misfit() {
        let source = wopr_source();
        let storage = MemoryStorage::new("mem://grow");
        let mut table = MisfitTable::alloc(&MisfitConfig::default(), &storage, 2, 3, &source)
            .expect("alloc should succeed");

        table.set_ens_size(5);
        assert_eq!(table.ens_size(), 5);
        for (iens, node) in table.nodes().iter().enumerate() {
            assert_eq!(node.iens(), iens);
            assert!(node.is_valid());
            assert_eq!(node.observation_count(), 0);
        }
    }

    #[test]
    fn set_ens_size_shrink_keeps_leading_nodes() {
        let source = wopr_source();
        let storage = MemoryStorage::new("mem://shrink");
        let mut table = MisfitTable::alloc(&MisfitConfig::default(), &storage, 2, 3, &source)
            .expect("alloc should succeed");
        let before: Vec<_> = table.nodes()[..2].to_vec();

        table.set_ens_size(2);
        assert_eq!(table.nodes(), before.as_slice());
        table.set_ens_size(2);
        assert_eq!(table.nodes(), before.as_slice());
    }

    #[test]
    fn create_ranking_sums_inclusive_window() {
        let source = wopr_source();
        let storage = MemoryStorage::new("mem://rank");
        let mut table = MisfitTable::alloc(&MisfitConfig::default(), &storage, 2, 3, &source)
            .expect("alloc should succeed");

        table
            .create_ranking(&["WOPR:P1"], 0, 2, "rank1", None)
            .expect("ranking should succeed");
        let ranking = table.ranking("rank1").expect("ranking stored");
        assert_eq!(ranking.total(0), Some(4.0));
        assert_eq!(ranking.total(2), Some(6.0));
        assert!(!ranking.is_valid(1));
        assert_eq!(
            table
                .get_ranking_permutation("rank1")
                .expect("permutation exists"),
            &[0, 2, 1]
        );

        table
            .create_ranking(&["WOPR:P1"], 0, 0, "rank1", None)
            .expect("ranking should succeed");
        assert_eq!(
            table.get_ranking_permutation("rank1").expect("replaced"),
            &[0, 2, 1]
        );
        assert_eq!(table.ranking("rank1").expect("stored").total(2), Some(3.0));
    }

    #[test]
    fn create_ranking_rejects_unknown_and_duplicate_keys() {
        let source = wopr_source();
        let storage = MemoryStorage::new("mem://keys");
        let mut table = MisfitTable::alloc(&MisfitConfig::default(), &storage, 2, 3, &source)
            .expect("alloc should succeed");

        let err = table
            .create_ranking(&["WWCT:P2"], 0, 2, "bad", None)
            .expect_err("unknown key");
        assert!(matches!(err, MisfitError::MissingKey(_)));
        assert!(!table.has_ranking("bad"));

        let err = table
            .create_ranking(&["WOPR:P1", "WOPR:P1"], 0, 2, "dup", None)
            .expect_err("duplicate key");
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn ranking_lookups_fail_for_unknown_keys() {
        let source = wopr_source();
        let storage = MemoryStorage::new("mem://lookup");
        let table = MisfitTable::alloc(&MisfitConfig::default(), &storage, 2, 3, &source)
            .expect("alloc should succeed");
        assert!(!table.has_ranking("nope"));
        let err = table
            .get_ranking_permutation("nope")
            .expect_err("no such ranking");
        assert!(matches!(err, MisfitError::MissingKey(_)));
        assert!(table.display_ranking("nope").is_err());
    }

    #[test]
    fn create_data_ranking_uses_accessor_values() {
        let source = wopr_source();
        let storage = MemoryStorage::new("mem://data");
        let mut table = MisfitTable::alloc(&MisfitConfig::default(), &storage, 2, 3, &source)
            .expect("alloc should succeed");

        table
            .create_data_ranking(
                4,
                &PoroAccessor,
                "PORO",
                "PORO:1,1,1",
                0,
                StateKind::Analyzed,
                "poro",
                None,
            )
            .expect("data ranking should succeed");
        let ranking = table.ranking("poro").expect("ranking stored");
        assert_eq!(ranking.len(), 4);
        assert!(!ranking.is_valid(1));
        assert_eq!(
            ranking.scores(2).and_then(|scores| scores.get("PORO")).copied(),
            Some(0.25)
        );
        assert_eq!(
            table.get_ranking_permutation("poro").expect("sorted"),
            &[2, 0, 3, 1]
        );
    }

    #[test]
    fn create_data_ranking_rejects_non_numeric_values() {
        struct TextAccessor;
        impl ScalarAccessor for TextAccessor {
            fn get_value(
                &self,
                _key_index: &str,
                _node_id: NodeId,
            ) -> Result<Option<NodeValue>, MisfitError> {
                Ok(Some(NodeValue::Text("SHUT".to_string())))
            }
        }

        let source = wopr_source();
        let storage = MemoryStorage::new("mem://text");
        let mut table = MisfitTable::alloc(&MisfitConfig::default(), &storage, 2, 3, &source)
            .expect("alloc should succeed");
        let err = table
            .create_data_ranking(
                3,
                &TextAccessor,
                "STATUS",
                "STATUS",
                1,
                StateKind::Forecast,
                "status",
                None,
            )
            .expect_err("text cannot be ranked");
        assert!(matches!(err, MisfitError::UnsupportedValueType(_)));
        assert!(!table.has_ranking("status"));
    }

    #[test]
    fn failed_report_write_keeps_previous_ranking() {
        let source = wopr_source();
        let storage = MemoryStorage::new("mem://report-failure");
        let mut table = MisfitTable::alloc(&MisfitConfig::default(), &storage, 2, 3, &source)
            .expect("alloc should succeed");
        table
            .create_ranking(&["WOPR:P1"], 0, 0, "rank1", None)
            .expect("first ranking should succeed");
        let before = table.ranking("rank1").cloned().expect("ranking stored");

        let blocker = std::env::temp_dir().join(format!(
            "misfit-table-report-blocker-{}",
            std::process::id()
        ));
        std::fs::write(&blocker, b"not a directory").expect("blocker file should be created");
        let report = blocker.join("nested").join("rank.txt");

        let err = table
            .create_ranking(&["WOPR:P1"], 0, 2, "rank1", Some(&report))
            .expect_err("report directory cannot be created under a file");
        assert!(matches!(err, MisfitError::StorageWriteFailure(_)));
        assert_eq!(table.ranking("rank1"), Some(&before));

        let err = table
            .create_ranking(&["WOPR:P1"], 0, 2, "rank2", Some(&report))
            .expect_err("report directory cannot be created under a file");
        assert!(matches!(err, MisfitError::StorageWriteFailure(_)));
        assert!(!table.has_ranking("rank2"));

        let _ = std::fs::remove_file(&blocker);
    }

    #[test]
    fn clear_drops_rankings_and_nodes() {
        let source = wopr_source();
        let storage = MemoryStorage::new("mem://clear");
        let mut table = MisfitTable::alloc(&MisfitConfig::default(), &storage, 2, 3, &source)
            .expect("alloc should succeed");
        table
            .create_ranking(&["WOPR:P1"], 0, 2, "rank1", None)
            .expect("ranking should succeed");

        table.clear();
        assert_eq!(table.ens_size(), 0);
        assert!(!table.has_ranking("rank1"));
    }

    #[test]
    fn load_case_restores_persisted_table() {
        let source = two_key_source();
        let storage = MemoryStorage::new("mem://load");
        let table = MisfitTable::alloc(&MisfitConfig::default(), &storage, 2, 3, &source)
            .expect("alloc should succeed");

        let loaded = MisfitTable::load_case(&storage, &source).expect("load should succeed");
        assert_eq!(loaded.case_id(), table.case_id());
        assert_eq!(loaded.history_length(), 2);
        assert_eq!(loaded.ens_size(), 3);
        assert_eq!(loaded.node(0), table.node(0));
        assert_eq!(loaded.node(1), table.node(1));
        let node2 = loaded.node(2).expect("member 2 exists");
        assert!(!node2.is_valid());
        assert_eq!(node2.observation_count(), 0, "invalid members persist no vectors");
    }

    #[test]
    fn buffer_fread_rejects_trailing_bytes_and_mismatched_vectors() {
        let source = wopr_source();
        let storage = MemoryStorage::new("mem://bad");
        let table = MisfitTable::alloc(&MisfitConfig::default(), &storage, 2, 3, &source)
            .expect("alloc should succeed");

        let mut buffer = BinaryBuffer::new();
        table.buffer_fwrite(&mut buffer).expect("encode");
        let mut bytes = buffer.into_bytes();
        bytes.push(0);
        let err = MisfitTable::buffer_fread_alloc(&mut BinaryBuffer::from_bytes(bytes), &source)
            .expect_err("trailing byte");
        assert!(err.to_string().contains("trailing bytes"));

        let mut buffer = BinaryBuffer::new();
        buffer.write_string("case").expect("string");
        buffer.write_int(3);
        buffer.write_int(1);
        buffer.write_int(0);
        buffer.write_bool(true);
        buffer.write_int(1);
        buffer.write_string("WOPR:P1").expect("string");
        buffer.write_doubles(&[1.0, 2.0]).expect("doubles");
        let err = MisfitTable::buffer_fread_alloc(&mut buffer, &source)
            .expect_err("two samples cannot cover four steps");
        assert!(matches!(err, MisfitError::SizeMismatch(_)));
    }

    #[test]
    fn buffer_fread_rejects_misplaced_nodes() {
        let source = wopr_source();
        let mut buffer = BinaryBuffer::new();
        buffer.write_string("case").expect("string");
        buffer.write_int(0);
        buffer.write_int(1);
        buffer.write_int(4);
        buffer.write_bool(false);
        let err = MisfitTable::buffer_fread_alloc(&mut buffer, &source)
            .expect_err("node 0 tagged as 4");
        assert!(err.to_string().contains("tagged iens=4"));
    }
}
