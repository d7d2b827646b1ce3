use crate::config::FlashLfqConfig;
use crate::data_sources::ScanSource;
use crate::errors::{
    ConfigError,
    Result,
};
use crate::indexing::SpectralIndex;
use crate::isotopes::{
    ConvolutionIsotopeProvider,
    IsotopeCache,
    IsotopeProvider,
};
use crate::models::{
    ChromatographicPeak,
    Identification,
    SpectraFile,
};
use crate::quantification::mbr::{
    align_all,
    plan_requests,
    recover_peaks,
};
use crate::quantification::normalization::normalization_factors;
use crate::quantification::peak_builder::sort_peaks;
use crate::quantification::{
    PeakBuilder,
    ProteinQuantEstimator,
    TopNEstimator,
    WeightedEstimator,
    NORMALIZATION_PASSES,
};
use crate::results::FlashLfqResults;
use indicatif::{
    ParallelProgressIterator,
    ProgressBar,
    ProgressStyle,
};
use rayon::prelude::*;
use std::collections::{
    BTreeMap,
    BTreeSet,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{
    debug,
    info,
    warn,
};

/// Label-free quantification of a set of identifications over their spectra files.
///
/// Each file is indexed and quantified independently on a rayon pool, match
/// between runs then runs per acceptor file once every file is done.
pub struct FlashLfqEngine {
    identifications: Vec<Arc<Identification>>,
    spectra_files: Vec<SpectraFile>,
    config: FlashLfqConfig,
    scan_source: Arc<dyn ScanSource>,
    isotope_provider: Box<dyn IsotopeProvider>,
}

struct FileOutput {
    file: SpectraFile,
    peaks: Vec<ChromatographicPeak>,
    index: Option<SpectralIndex>,
}

impl FlashLfqEngine {
    /// Fails on an invalid configuration.
    pub fn new(
        identifications: Vec<Identification>,
        scan_source: Arc<dyn ScanSource>,
        config: FlashLfqConfig,
    ) -> Result<Self> {
        config.validate()?;
        let spectra_files: BTreeSet<SpectraFile> = identifications
            .iter()
            .map(|x| x.spectra_file.clone())
            .collect();
        Ok(Self {
            identifications: identifications.into_iter().map(Arc::new).collect(),
            spectra_files: spectra_files.into_iter().collect(),
            config,
            scan_source,
            isotope_provider: Box::new(ConvolutionIsotopeProvider::default()),
        })
    }

    /// Adds files without identifications of their own. They are quantified
    /// only through match between runs.
    pub fn with_spectra_files(mut self, files: impl IntoIterator<Item = SpectraFile>) -> Self {
        let mut all: BTreeSet<SpectraFile> = self.spectra_files.into_iter().collect();
        all.extend(files);
        self.spectra_files = all.into_iter().collect();
        self
    }

    pub fn with_isotope_provider(mut self, provider: Box<dyn IsotopeProvider>) -> Self {
        self.isotope_provider = provider;
        self
    }

    pub fn config(&self) -> &FlashLfqConfig {
        &self.config
    }

    pub fn spectra_files(&self) -> &[SpectraFile] {
        &self.spectra_files
    }

    pub fn run(&self) -> Result<FlashLfqResults> {
        let start = Instant::now();
        let mut pool_builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = self.config.num_threads() {
            pool_builder = pool_builder.num_threads(n);
        }
        let pool = pool_builder
            .build()
            .map_err(|e| ConfigError::ThreadPool { msg: e.to_string() })?;
        info!(
            "Quantifying {} identifications over {} files with {} threads",
            self.identifications.len(),
            self.spectra_files.len(),
            pool.current_num_threads()
        );

        let results = pool.install(|| self.run_in_pool())?;
        info!("Finished in {:?}: {}", start.elapsed(), results.summary());
        Ok(results)
    }

    fn run_in_pool(&self) -> Result<FlashLfqResults> {
        let st = Instant::now();
        let isotopes = IsotopeCache::build(self.isotope_provider.as_ref(), &self.identifications)?;
        debug!("Isotope distributions took {:?}", st.elapsed());

        let mut ids_by_file: BTreeMap<&SpectraFile, Vec<Arc<Identification>>> = self
            .spectra_files
            .iter()
            .map(|x| (x, Vec::new()))
            .collect();
        for id in self.identifications.iter() {
            if let Some(ids) = ids_by_file.get_mut(&id.spectra_file) {
                ids.push(id.clone());
            }
        }

        let keep_index = self.config.match_between_runs && self.spectra_files.len() > 1;
        let outputs: Vec<FileOutput> = self
            .spectra_files
            .par_iter()
            .progress_with(self.progress_bar(self.spectra_files.len()))
            .map(|file| {
                let ids = ids_by_file.get(file).map(|x| x.as_slice()).unwrap_or_default();
                self.quantify_file(file, ids, &isotopes, keep_index)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut results = FlashLfqResults::new(self.spectra_files.clone(), &self.identifications);
        let mut indices: BTreeMap<SpectraFile, SpectralIndex> = BTreeMap::new();
        for out in outputs {
            if let Some(index) = out.index {
                indices.insert(out.file.clone(), index);
            }
            results.peaks.insert(out.file, out.peaks);
        }

        if keep_index {
            self.match_between_runs(&mut results, &indices, &isotopes);
        } else if self.config.match_between_runs {
            warn!("Match between runs needs at least two spectra files, skipping");
        }
        drop(indices);

        results.calculate_peptide_results();

        if self.config.normalize {
            self.normalize(&mut results);
        }

        let estimator: Box<dyn ProteinQuantEstimator> = if self.config.advanced_protein_quant {
            Box::new(WeightedEstimator {
                outlier_cutoff_log2: self.config.outlier_cutoff_log2,
                fallback: TopNEstimator { n: self.config.top_n },
            })
        } else {
            Box::new(TopNEstimator { n: self.config.top_n })
        };
        results.calculate_protein_results(
            estimator.as_ref(),
            self.config.use_shared_peptides_for_protein_quant,
        );
        Ok(results)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(file = %file))]
    fn quantify_file(
        &self,
        file: &SpectraFile,
        identifications: &[Arc<Identification>],
        isotopes: &IsotopeCache,
        keep_index: bool,
    ) -> Result<FileOutput> {
        let st = Instant::now();
        let scans = self.scan_source.load_scans(file)?;
        let (index, stats) = SpectralIndex::from_scans(&scans)
            .map_err(|e| e.append_to_context(&format!(" while indexing {}", file)))?;
        drop(scans);
        debug!("Indexed {} in {:?}: {}", file, st.elapsed(), stats);

        let builder = PeakBuilder::new(&index, isotopes, &self.config, file);
        let peaks = builder.quantify_identifications(identifications);
        debug!("Built {} peaks for {} in {:?}", peaks.len(), file, st.elapsed());

        Ok(FileOutput {
            file: file.clone(),
            peaks,
            index: if keep_index { Some(index) } else { None },
        })
    }

    fn match_between_runs(
        &self,
        results: &mut FlashLfqResults,
        indices: &BTreeMap<SpectraFile, SpectralIndex>,
        isotopes: &IsotopeCache,
    ) {
        let st = Instant::now();
        let alignments = align_all(&results.peaks);
        let requests = plan_requests(&results.peaks, &alignments, &self.config);
        let num_requests: usize = requests.values().map(|x| x.len()).sum();
        info!("Match between runs: {} requests", num_requests);

        let peaks = &results.peaks;
        let recovered: Vec<(SpectraFile, Vec<ChromatographicPeak>)> = requests
            .par_iter()
            .filter_map(|(file, file_requests)| {
                let index = indices.get(file)?;
                let builder = PeakBuilder::new(index, isotopes, &self.config, file);
                let existing = peaks.get(file).map(|x| x.as_slice()).unwrap_or_default();
                let found = recover_peaks(&builder, file_requests, existing, self.config.integrate);
                Some((file.clone(), found))
            })
            .collect();

        let mut num_recovered = 0;
        for (file, found) in recovered {
            num_recovered += found.len();
            let file_peaks = results.peaks.entry(file).or_default();
            file_peaks.extend(found);
            sort_peaks(file_peaks);
        }
        info!(
            "Match between runs recovered {} peaks in {:?}",
            num_recovered,
            st.elapsed()
        );
    }

    fn normalize(&self, results: &mut FlashLfqResults) {
        for level in NORMALIZATION_PASSES {
            let pass = normalization_factors(level, &results.spectra_files, &results.peptides);
            if pass.is_identity() {
                debug!("Normalization by {}: nothing to do", level);
                continue;
            }
            for (file, factor) in pass.factors.iter() {
                info!("Normalization by {}: {} x {:.4}", level, file, factor);
                if let Some(peaks) = results.peaks.get_mut(file) {
                    peaks.iter_mut().for_each(|p| p.scale(*factor));
                }
            }
            results.calculate_peptide_results();
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if self.config.silent {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
        )
        .expect("static progress template is valid");
        ProgressBar::new(len as u64).with_style(style)
    }
}
