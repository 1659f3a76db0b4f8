//! 지난 로그 보관 처리
//!
//! 초기화/회전 때마다 동기적으로 실행됩니다.
//!
//! 1. **보조 로그 분할**: 외부 컴포넌트가 쓰는 보조 로그 파일의 내용을 전날 날짜 파일로
//!    옮기고 원본을 0바이트로 자릅니다.
//! 2. **압축 정리**: 오늘이 아닌 날짜 파일(`YYYY-MM-DD.log`, `YYYY-MM-DD-<name>.log`)을
//!    분류별 보관 디렉토리에 `.tar.gz` 로 압축한 뒤 원본을 삭제합니다.

use chrono::NaiveDate;
use flate2::write::GzEncoder;
use flate2::Compression;
use regex::Regex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::logging::clock::date_string;
use crate::logging::config::ArchiveTarget;
use crate::logging::error::ArchiveError;

/// 보조 로그 복사 단위
pub const COPY_CHUNK_SIZE: usize = 8 * 1024;

/// 기본 로그의 보관 디렉토리 이름
pub const PRIMARY_ARCHIVE_DIR: &str = "archives";

/// 보관 실행 결과
#[derive(Debug, Default, Clone)]
pub struct ArchiveReport {
    /// 내용을 전날 파일로 옮긴 보조 로그 이름
    pub rolled_over: Vec<String>,
    /// 새로 만든 압축 파일 경로
    pub archived: Vec<PathBuf>,
    /// 압축/삭제에 실패한 파일과 원인
    pub failures: Vec<(PathBuf, String)>,
}

impl ArchiveReport {
    pub fn is_empty(&self) -> bool {
        self.rolled_over.is_empty() && self.archived.is_empty() && self.failures.is_empty()
    }
}

struct TargetPattern {
    target: ArchiveTarget,
    pattern: Regex,
}

/// 보관기
pub struct Archiver {
    log_dir: PathBuf,
    primary_pattern: Regex,
    targets: Vec<TargetPattern>,
}

impl Archiver {
    /// 새 보관기 생성
    pub fn new<P: AsRef<Path>>(log_dir: P, targets: &[ArchiveTarget]) -> Result<Self, regex::Error> {
        let primary_pattern = Regex::new(r"^(\d{4}-\d{2}-\d{2})\.log$")?;
        let targets = targets
            .iter()
            .map(|target| {
                let pattern = Regex::new(&format!(
                    r"^(\d{{4}}-\d{{2}}-\d{{2}})-{}\.log$",
                    regex::escape(&target.name)
                ))?;
                Ok(TargetPattern {
                    target: target.clone(),
                    pattern,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            log_dir: log_dir.as_ref().to_path_buf(),
            primary_pattern,
            targets,
        })
    }

    /// 분할 후 압축 정리를 차례로 수행
    ///
    /// 분할 단계의 I/O 실패는 에러로 반환되고, 압축 단계의 파일별 실패는 보고서에 기록됩니다.
    pub fn run(&self, today: NaiveDate) -> Result<ArchiveReport, ArchiveError> {
        ensure_dir(&self.log_dir)
            .map_err(|e| ArchiveError::io("로그 디렉토리 생성", &self.log_dir, e))?;

        let rolled_over = self.roll_over_targets(today)?;
        let mut report = self.sweep(today)?;
        report.rolled_over = rolled_over;

        if !report.is_empty() {
            info!(
                rolled_over = report.rolled_over.len(),
                archived = report.archived.len(),
                failures = report.failures.len(),
                "지난 로그 보관 완료"
            );
        }
        Ok(report)
    }

    /// 비어 있지 않은 보조 로그를 전날 날짜 파일로 옮김
    pub fn roll_over_targets(&self, today: NaiveDate) -> Result<Vec<String>, ArchiveError> {
        let yesterday = today.pred_opt().unwrap_or(today);
        let mut rolled_over = Vec::new();

        for TargetPattern { target, .. } in &self.targets {
            if self.roll_over(target, yesterday)? {
                rolled_over.push(target.name.clone());
            }
        }
        Ok(rolled_over)
    }

    /// 전날 날짜 파일 경로: `<log_dir>/<date>-<name>.log`
    pub fn dated_target_path(&self, target: &ArchiveTarget, date: NaiveDate) -> PathBuf {
        self.log_dir
            .join(format!("{}-{}.log", date_string(date), target.name))
    }

    fn roll_over(&self, target: &ArchiveTarget, date: NaiveDate) -> Result<bool, ArchiveError> {
        let source_path = &target.file_path;
        let size = match fs::metadata(source_path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(ArchiveError::io("보조 로그 메타데이터 읽기", source_path, e)),
        };
        if size == 0 {
            return Ok(false);
        }

        let dated_path = self.dated_target_path(target, date);
        let mut source = File::open(source_path)
            .map_err(|e| ArchiveError::io("보조 로그 열기", source_path, e))?;
        let dated = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&dated_path)
            .map_err(|e| ArchiveError::io("날짜별 보조 로그 열기", &dated_path, e))?;
        let mut writer = BufWriter::new(dated);

        let copied = copy_until_settled(&mut source, &mut writer, || {
            fs::metadata(source_path).map(|metadata| metadata.len())
        })
        .map_err(|e| ArchiveError::io("보조 로그 복사", source_path, e))?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|e| ArchiveError::io("날짜별 보조 로그 쓰기", &dated_path, e))?;

        OpenOptions::new()
            .write(true)
            .open(source_path)
            .and_then(|file| file.set_len(0))
            .map_err(|e| ArchiveError::io("보조 로그 비우기", source_path, e))?;

        debug!(
            target_name = %target.name,
            bytes = copied,
            path = %dated_path.display(),
            "보조 로그 분할 완료"
        );
        Ok(true)
    }

    /// 파일 이름이 날짜 패턴과 맞으면 (날짜 문자열, 보관 디렉토리 이름) 반환
    fn classify(&self, file_name: &str) -> Option<(String, String)> {
        if let Some(caps) = self.primary_pattern.captures(file_name) {
            return Some((caps[1].to_string(), PRIMARY_ARCHIVE_DIR.to_string()));
        }
        self.targets.iter().find_map(|TargetPattern { target, pattern }| {
            pattern
                .captures(file_name)
                .map(|caps| (caps[1].to_string(), format!("{}-archives", target.name)))
        })
    }

    /// 오늘이 아닌 날짜 파일을 압축하고 원본 삭제
    pub fn sweep(&self, today: NaiveDate) -> Result<ArchiveReport, ArchiveError> {
        let today = date_string(today);
        let mut report = ArchiveReport::default();

        let entries = fs::read_dir(&self.log_dir)
            .map_err(|e| ArchiveError::io("로그 디렉토리 읽기", &self.log_dir, e))?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ArchiveError::io("디렉토리 항목 읽기", &self.log_dir, e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Some((date, archive_dir)) = self.classify(&file_name) {
                if date != today {
                    candidates.push((entry.path(), file_name, archive_dir));
                }
            }
        }
        candidates.sort();

        for (source, file_name, archive_dir) in candidates {
            let archive_dir = self.log_dir.join(archive_dir);
            if let Err(e) = ensure_dir(&archive_dir) {
                warn!(path = %archive_dir.display(), error = %e, "보관 디렉토리 생성 실패");
                report.failures.push((source, e.to_string()));
                continue;
            }

            let dest = unique_archive_path(&archive_dir, &file_name);
            if let Err(e) = compress_file(&source, &dest) {
                warn!(path = %source.display(), error = %e, "로그 압축 실패");
                let _ = fs::remove_file(&dest);
                report.failures.push((source, e.to_string()));
                continue;
            }

            if let Err(e) = fs::remove_file(&source) {
                warn!(path = %source.display(), error = %e, "압축한 원본 삭제 실패");
                report.failures.push((source, e.to_string()));
            }
            debug!(archive = %dest.display(), "로그 압축 완료");
            report.archived.push(dest);
        }

        Ok(report)
    }
}

/// `<dir>/<file>.tar.gz` 가 이미 있으면 `<file>.1.tar.gz`, `<file>.2.tar.gz` ... 중 빈 이름 선택
fn unique_archive_path(dir: &Path, file_name: &str) -> PathBuf {
    let first = dir.join(format!("{}.tar.gz", file_name));
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| dir.join(format!("{}.{}.tar.gz", file_name, n)))
        .find(|path| !path.exists())
        .unwrap_or(first)
}

/// 파일 하나를 담은 `.tar.gz` 생성
pub fn compress_file(source: &Path, dest: &Path) -> io::Result<()> {
    let entry_name = source
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "파일 이름 없음"))?;

    let encoder = GzEncoder::new(File::create(dest)?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_path_with_name(source, entry_name)?;
    let encoder = builder.into_inner()?;
    encoder.finish()?.sync_all()
}

/// 디렉토리가 없으면 0755 권한으로 생성
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(path)?;
    debug!(path = %path.display(), "디렉토리 자동 생성");
    Ok(())
}

/// 원본 길이가 복사량과 같아질 때까지 다시 확인하는 횟수
const MAX_SETTLE_CHECKS: usize = 3;

/// `source` 를 끝까지 복사하고, 그 사이 늘어난 내용도 이어서 복사
///
/// 읽기가 끝났을 때 `current_len` 이 복사한 양보다 크면 다시 읽습니다.
/// 마지막 확인과 원본 비우기 사이에 추가된 바이트는 보존되지 않습니다.
fn copy_until_settled<R, W, F>(source: &mut R, writer: &mut W, mut current_len: F) -> io::Result<u64>
where
    R: Read,
    W: Write,
    F: FnMut() -> io::Result<u64>,
{
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    let mut copied = 0u64;
    let mut checks = 0;
    loop {
        match source.read(&mut buf) {
            Ok(0) => {
                checks += 1;
                if checks > MAX_SETTLE_CHECKS || current_len()? <= copied {
                    break;
                }
            }
            Ok(n) => {
                writer.write_all(&buf[..n])?;
                copied += n as u64;
                checks = 0;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(copied)
}
