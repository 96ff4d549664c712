//! Purchase request in, justification letter out.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Context;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::docx::WordDocument;
use crate::error::LetterError;
use crate::extract::{extract_lines, Extraction};
use crate::fields::{Field, FieldMap};
use crate::fill::{fill_document, FillReport};

/// File name of the generated letter inside a job directory.
pub const OUTPUT_FILE_NAME: &str = "surat_output.docx";

/// Body of the template written by `--init-template`; uses every placeholder.
pub const STARTER_TEMPLATE: [&str; 17] = [
    "Nomor\t: [NOMOR_SURAT]",
    "Perihal\t: [PERIHAL_SURAT]",
    "",
    "Kepada Yth.",
    "[NAMA_PENERIMA]",
    "[ALAMAT_PENERIMA]",
    "",
    "Dengan hormat,",
    "[ISI_SURAT]",
    "Nama barang/jasa: [NAMA_BARANG]",
    "Jumlah: [JUMLAH_BARANG]",
    "Harga satuan: Rp [HARGA_SATUAN]",
    "Total biaya: Rp [TOTAL_BIAYA]",
    "",
    "Hormat kami,",
    "[NAMA_PENGIRIM]",
    "[JABATAN_PENGIRIM]",
];

#[derive(Debug)]
pub struct LetterReport {
    pub output: PathBuf,
    pub fields: FieldMap,
    pub missing: Vec<Field>,
    pub fill: FillReport,
}

/// Reads the purchase request at `source`.
pub fn read_request(source: &Path) -> Result<Extraction, LetterError> {
    let doc = WordDocument::open(source).map_err(|e| LetterError::parse(source, e))?;
    let extraction = extract_lines(&doc.paragraph_texts());
    info!(
        source = %source.display(),
        fields = extraction.fields.len(),
        items = extraction.table.items.len(),
        prices = extraction.table.unit_prices.len(),
        "purchase request parsed"
    );
    Ok(extraction)
}

/// Fills `template` with `fields` and writes the result to `output`.
pub fn write_letter(
    template: &Path,
    fields: &FieldMap,
    output: &Path,
) -> Result<FillReport, LetterError> {
    let mut doc = WordDocument::open(template).map_err(|e| LetterError::template(template, e))?;
    let report = fill_document(&mut doc, fields).map_err(LetterError::fill)?;
    doc.save(output).map_err(|e| LetterError::write(output, e))?;
    info!(
        output = %output.display(),
        replacements = report.replacements,
        "letter written"
    );
    Ok(report)
}

pub fn generate_letter(
    source: &Path,
    template: &Path,
    output: &Path,
) -> Result<LetterReport, LetterError> {
    let extraction = read_request(source)?;
    let missing = extraction.missing();
    if !missing.is_empty() {
        warn!(?missing, "purchase request lacks some fields");
    }
    let fill = write_letter(template, &extraction.fields, output)?;
    Ok(LetterReport {
        output: output.to_path_buf(),
        fields: extraction.fields,
        missing,
        fill,
    })
}

/// Files belonging to one upload, kept apart from every other upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobPaths {
    pub id: String,
    pub dir: PathBuf,
}

impl JobPaths {
    pub fn create(upload_dir: &Path) -> anyhow::Result<Self> {
        let id = Uuid::new_v4().simple().to_string();
        let dir = upload_dir.join(&id);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create job dir: {}", dir.display()))?;
        Ok(Self { id, dir })
    }

    /// Resolves an existing job; ids are the 32-hex-digit form from [`JobPaths::create`].
    pub fn find(upload_dir: &Path, id: &str) -> Option<Self> {
        if !is_job_id(id) {
            return None;
        }
        let dir = upload_dir.join(id);
        dir.is_dir().then(|| Self {
            id: id.to_string(),
            dir,
        })
    }

    pub fn upload(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    pub fn output(&self) -> PathBuf {
        self.dir.join(OUTPUT_FILE_NAME)
    }

    /// Deletes the job directory and everything in it.
    pub fn remove(&self) -> anyhow::Result<()> {
        std::fs::remove_dir_all(&self.dir)
            .with_context(|| format!("remove job dir: {}", self.dir.display()))
    }
}

fn is_job_id(name: &str) -> bool {
    name.len() == 32 && name.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Deletes finished jobs beyond the newest `keep`, never touching `current`.
///
/// `current` counts toward `keep`. Jobs without a letter yet, jobs newer than
/// `current`, and non-job entries of `upload_dir` are left alone. Returns the
/// number of job directories removed.
pub fn prune_jobs(upload_dir: &Path, keep: usize, current: &str) -> anyhow::Result<usize> {
    let modified_at = |path: &Path| {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH)
    };
    let cutoff = modified_at(upload_dir.join(current).as_path());
    let mut jobs: Vec<(SystemTime, JobPaths)> = Vec::new();
    let entries = std::fs::read_dir(upload_dir)
        .with_context(|| format!("read upload dir: {}", upload_dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read upload dir: {}", upload_dir.display()))?;
        let Some(id) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if id == current || !is_job_id(&id) || !entry.path().is_dir() {
            continue;
        }
        let job = JobPaths { id, dir: entry.path() };
        if !job.output().is_file() {
            continue;
        }
        let modified = modified_at(job.dir.as_path());
        if modified > cutoff {
            continue;
        }
        jobs.push((modified, job));
    }

    jobs.sort_by(|a, b| b.0.cmp(&a.0));
    let mut removed = 0;
    for (_, job) in jobs.into_iter().skip(keep.saturating_sub(1)) {
        match job.remove() {
            Ok(()) => removed += 1,
            Err(e) => warn!("{e:#}"),
        }
    }
    if removed > 0 {
        debug!(removed, keep, "old jobs pruned");
    }
    Ok(removed)
}
