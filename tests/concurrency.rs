use identity_link::{
    CandidateResolver, GoldenRecord, GoldenRecordStore, HumanName, InMemoryGoldenRecordStore,
    InMemoryLinkStore, Link, LinkError, LinkService, LinkSource, LinkStore, MatchResult,
    NameBirthDateComparator, Pid, ResolutionConfig, SourceRecord, StorageError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

fn patient(pid: u64, family: &str) -> SourceRecord {
    SourceRecord::new(format!("Patient/{pid}"))
        .with_pid(Pid::new(pid))
        .with_name(HumanName::new(family, ["Pat"]))
}

/// Lets another writer win the first insert race.
struct RacingLinkStore {
    inner: InMemoryLinkStore,
    raced: AtomicBool,
}

/// Every insert collides, and the colliding row is never visible.
struct AlwaysConflictingLinkStore {
    inner: InMemoryLinkStore,
    inserts: AtomicUsize,
}

/// Accepts the first golden record update and fails every later one.
struct FailingAfterFirstUpdate {
    inner: InMemoryGoldenRecordStore,
    updates: AtomicUsize,
}

impl GoldenRecordStore for FailingAfterFirstUpdate {
    fn create(&self, golden: GoldenRecord) -> Result<GoldenRecord, StorageError> {
        self.inner.create(golden)
    }

    fn get(&self, pid: Pid) -> Result<Option<GoldenRecord>, StorageError> {
        self.inner.get(pid)
    }

    fn update(&self, golden: GoldenRecord) -> Result<GoldenRecord, StorageError> {
        if self.updates.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(StorageError::BackendError("disk full".to_string()));
        }
        self.inner.update(golden)
    }

    fn find_by_enterprise_id(
        &self,
        system: &str,
        value: &str,
    ) -> Result<Vec<GoldenRecord>, StorageError> {
        self.inner.find_by_enterprise_id(system, value)
    }

    fn all(&self) -> Result<Vec<GoldenRecord>, StorageError> {
        self.inner.all()
    }

    fn count(&self) -> Result<usize, StorageError> {
        self.inner.count()
    }
}

macro_rules! delegate_reads {
    () => {
        fn find_link(&self, source_pid: Pid, golden_pid: Pid) -> Result<Option<Link>, StorageError> {
            self.inner.find_link(source_pid, golden_pid)
        }

        fn find_matched_link(&self, source_pid: Pid) -> Result<Option<Link>, StorageError> {
            self.inner.find_matched_link(source_pid)
        }

        fn find_by_source(&self, source_pid: Pid) -> Result<Vec<Link>, StorageError> {
            self.inner.find_by_source(source_pid)
        }

        fn find_by_golden(&self, golden_pid: Pid) -> Result<Vec<Link>, StorageError> {
            self.inner.find_by_golden(golden_pid)
        }

        fn find_by_match_result(&self, match_result: MatchResult) -> Result<Vec<Link>, StorageError> {
            self.inner.find_by_match_result(match_result)
        }

        fn update(&self, link: Link) -> Result<Link, StorageError> {
            self.inner.update(link)
        }

        fn count(&self) -> Result<usize, StorageError> {
            self.inner.count()
        }
    };
}

impl LinkStore for RacingLinkStore {
    delegate_reads!();

    fn insert(&self, link: Link) -> Result<Link, StorageError> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let competitor = Link::new(
                link.source_pid,
                link.golden_pid,
                MatchResult::PossibleMatch,
                LinkSource::Auto,
                None,
            );
            self.inner.insert(competitor)?;
        }
        self.inner.insert(link)
    }
}

impl LinkStore for AlwaysConflictingLinkStore {
    delegate_reads!();

    fn insert(&self, link: Link) -> Result<Link, StorageError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::DuplicateKey(format!(
            "{}->{}",
            link.source_pid, link.golden_pid
        )))
    }
}

fn service_over(links: Arc<dyn LinkStore>) -> (Arc<LinkService>, Arc<InMemoryGoldenRecordStore>) {
    let golden_records = Arc::new(InMemoryGoldenRecordStore::new());
    let service = LinkService::new(links, golden_records.clone(), &ResolutionConfig::default())
        .unwrap();
    (Arc::new(service), golden_records)
}

#[test]
fn concurrent_updates_of_one_pair_leave_one_link() {
    let links = Arc::new(InMemoryLinkStore::new());
    let (service, _) = service_over(links.clone());
    let source = patient(1, "Doe");
    let golden = service.accessor().create_from_source(&source).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                service
                    .update_link(&source, &golden, MatchResult::Match, LinkSource::Auto)
                    .unwrap();
            });
        }
    });

    assert_eq!(links.count().unwrap(), 1);
    let link = links.find_link(Pid::new(1), golden.pid.unwrap()).unwrap().unwrap();
    assert_eq!(link.version, 8);
    let golden_now = service.accessor().get(golden.pid.unwrap()).unwrap();
    assert_eq!(golden_now.links.len(), 1);
}

#[test]
fn concurrent_attachments_to_one_golden_record_compose() {
    let links = Arc::new(InMemoryLinkStore::new());
    let (service, _) = service_over(links.clone());
    let golden = service.accessor().create_from_source(&patient(100, "Doe")).unwrap();

    std::thread::scope(|scope| {
        for pid in 1..=16 {
            let service = &service;
            let golden = &golden;
            scope.spawn(move || {
                service
                    .update_link(&patient(pid, "Doe"), golden, MatchResult::Match, LinkSource::Auto)
                    .unwrap();
            });
        }
    });

    let golden_now = service.accessor().get(golden.pid.unwrap()).unwrap();
    assert_eq!(golden_now.links.len(), 16);
    for pid in 1..=16 {
        assert!(golden_now.is_linked_to(Pid::new(pid)));
    }
    assert_eq!(links.find_by_golden(golden.pid.unwrap()).unwrap().len(), 16);
}

#[test]
fn concurrent_resolution_of_different_people_mints_separate_golden_records() {
    let links = Arc::new(InMemoryLinkStore::new());
    let (service, golden_records) = service_over(links.clone());
    let resolver = CandidateResolver::new(service, Arc::new(NameBirthDateComparator));
    let families = ["Doe", "Roe", "Poe", "Moe"];

    std::thread::scope(|scope| {
        for (i, family) in families.iter().enumerate() {
            let resolver = &resolver;
            scope.spawn(move || {
                resolver.resolve(&patient(i as u64 + 1, family)).unwrap();
            });
        }
    });

    assert_eq!(golden_records.count().unwrap(), families.len());
    assert_eq!(links.count().unwrap(), families.len());
}

#[test]
fn lost_insert_race_is_retried_as_an_update() {
    let links = Arc::new(RacingLinkStore {
        inner: InMemoryLinkStore::new(),
        raced: AtomicBool::new(false),
    });
    let (service, _) = service_over(links.clone());
    let source = patient(1, "Doe");
    let golden = service.accessor().create_from_source(&source).unwrap();

    let update = service
        .update_link(&source, &golden, MatchResult::Match, LinkSource::Auto)
        .unwrap();

    assert!(!update.created);
    assert_eq!(update.link.match_result, MatchResult::Match);
    assert_eq!(update.link.version, 2);
    assert_eq!(links.count().unwrap(), 1);
    assert!(update.golden.is_linked_to(Pid::new(1)));
}

#[test]
fn exhausted_retries_surface_conflict_and_restore_golden_record() {
    let links = Arc::new(AlwaysConflictingLinkStore {
        inner: InMemoryLinkStore::new(),
        inserts: AtomicUsize::new(0),
    });
    let (service, golden_records) = service_over(links.clone());
    let source = patient(1, "Doe");
    let golden = service.accessor().create_from_source(&source).unwrap();

    let err = service
        .update_link(&source, &golden, MatchResult::Match, LinkSource::Auto)
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(matches!(err, LinkError::ConflictOnInsert { attempts: 3, .. }));
    assert_eq!(links.inserts.load(Ordering::SeqCst), 3);

    let golden_now = golden_records.get(golden.pid.unwrap()).unwrap().unwrap();
    assert!(golden_now.links.is_empty());
    assert_eq!(golden_now.name, golden.name);
    assert_eq!(golden_now.identifiers, golden.identifiers);
}

#[test]
fn failed_restore_reports_both_failures() {
    let links = Arc::new(AlwaysConflictingLinkStore {
        inner: InMemoryLinkStore::new(),
        inserts: AtomicUsize::new(0),
    });
    let golden_records = Arc::new(FailingAfterFirstUpdate {
        inner: InMemoryGoldenRecordStore::new(),
        updates: AtomicUsize::new(0),
    });
    let service =
        LinkService::new(links.clone(), golden_records, &ResolutionConfig::default()).unwrap();
    let source = patient(1, "Doe");
    let golden = service.accessor().create_from_source(&source).unwrap();

    let err = service
        .update_link(&source, &golden, MatchResult::Match, LinkSource::Auto)
        .unwrap_err();

    let LinkError::RestoreFailed { golden_pid, cause, restore } = err else {
        panic!("expected a restore failure");
    };
    assert_eq!(Some(golden_pid), golden.pid);
    assert!(cause.contains("Duplicate key"));
    assert!(restore.contains("disk full"));
    assert_eq!(links.inserts.load(Ordering::SeqCst), 1);
}
