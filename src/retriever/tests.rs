use super::*;
use crate::classifier::{ErrorKind, classify};
use crate::handle::MemoryHandleStore;
use crate::types::FileId;
use std::collections::VecDeque;
use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};

type Reply = std::result::Result<Bytes, ClassifiedError>;

/// Source whose responses are released by the test, one per call, in call order
struct ScriptedSource {
    pending: Mutex<VecDeque<oneshot::Receiver<Reply>>>,
    started: mpsc::UnboundedSender<Option<String>>,
}

fn scripted(
    calls: usize,
) -> (
    Arc<ScriptedSource>,
    Vec<oneshot::Sender<Reply>>,
    mpsc::UnboundedReceiver<Option<String>>,
) {
    let mut senders = Vec::new();
    let mut receivers = VecDeque::new();
    for _ in 0..calls {
        let (tx, rx) = oneshot::channel();
        senders.push(tx);
        receivers.push_back(rx);
    }
    let (started_tx, started_rx) = mpsc::unbounded_channel();
    let source = Arc::new(ScriptedSource {
        pending: Mutex::new(receivers),
        started: started_tx,
    });
    (source, senders, started_rx)
}

#[async_trait]
impl ContentSource for ScriptedSource {
    async fn fetch(&self, _token: &ShareToken, password: Option<&str>) -> Reply {
        let rx = self
            .pending
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected fetch");
        self.started.send(password.map(str::to_string)).ok();
        rx.await
            .unwrap_or_else(|_| Err(classifier::network("reply dropped")))
    }
}

/// Source that answers immediately and records the passwords it saw
struct StaticSource {
    reply: Reply,
    passwords: Mutex<Vec<Option<String>>>,
}

impl StaticSource {
    fn ok(body: &'static [u8]) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(Bytes::from_static(body)),
            passwords: Mutex::new(Vec::new()),
        })
    }

    fn failing(err: ClassifiedError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(err),
            passwords: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ContentSource for StaticSource {
    async fn fetch(&self, _token: &ShareToken, password: Option<&str>) -> Reply {
        self.passwords
            .lock()
            .unwrap()
            .push(password.map(str::to_string));
        self.reply.clone()
    }
}

struct BrokenSink;

#[async_trait]
impl DownloadSink for BrokenSink {
    async fn save(&self, file_name: &str, _: &HandleSnapshot, _: Bytes) -> Result<PathBuf> {
        Err(crate::error::Error::SaveFailed {
            file_name: file_name.to_string(),
            dir: PathBuf::from("/nowhere"),
            reason: "disk full".into(),
        })
    }
}

fn link(mime: &str) -> ShareLink {
    ShareLink {
        token: ShareToken::new("tok-1"),
        file_id: FileId::new("f-1"),
        file_name: "report.pdf".into(),
        file_size_bytes: 4,
        mime_type: mime.into(),
        has_password: false,
        available_from: None,
        available_to: None,
        server_status: None,
        uploaded_by: None,
        confirmed_status: None,
    }
}

fn retriever(
    source: Arc<dyn ContentSource>,
    sink: Arc<dyn DownloadSink>,
) -> (Arc<ContentRetriever>, Arc<MemoryHandleStore>) {
    let store = Arc::new(MemoryHandleStore::new());
    (
        Arc::new(ContentRetriever::new(source, store.clone(), sink)),
        store,
    )
}

fn installed(result: PreviewRetrieval) -> HandleSnapshot {
    match result {
        PreviewRetrieval::Installed(snapshot) => snapshot,
        PreviewRetrieval::Superseded => panic!("expected an installed handle"),
    }
}

#[tokio::test]
async fn test_preview_installs_current_handle() {
    let temp_dir = TempDir::new().unwrap();
    let (retriever, store) = retriever(
        StaticSource::ok(b"%PDF"),
        Arc::new(FileSystemSink::new(temp_dir.path())),
    );

    let snapshot = installed(
        retriever
            .retrieve_for_preview(&link("application/pdf"), &AccessCredential::none())
            .await
            .unwrap(),
    );

    assert_eq!(snapshot.mime_type, "application/pdf");
    assert_eq!(retriever.current(), Some(snapshot.clone()));
    assert_eq!(store.resolve(snapshot.id).as_deref(), Some(&b"%PDF"[..]));
}

#[tokio::test]
async fn test_switching_credentials_revokes_previous_handle_once() {
    let temp_dir = TempDir::new().unwrap();
    let (retriever, store) = retriever(
        StaticSource::ok(b"image"),
        Arc::new(FileSystemSink::new(temp_dir.path())),
    );
    let link = link("image/png");

    let first = installed(
        retriever
            .retrieve_for_preview(&link, &AccessCredential::password("one"))
            .await
            .unwrap(),
    );
    let second = installed(
        retriever
            .retrieve_for_preview(&link, &AccessCredential::password("two"))
            .await
            .unwrap(),
    );

    assert_ne!(first.id, second.id);
    assert_eq!(store.revocations(first.id), 1);
    assert_eq!(store.revocations(second.id), 0);
    assert_eq!(store.live_count(), 1);

    retriever.teardown();
    assert_eq!(store.revocations(first.id), 1);
    assert_eq!(store.revocations(second.id), 1);
    assert_eq!(store.live_count(), 0);
}

#[tokio::test]
async fn test_password_is_passed_only_when_non_empty() {
    let temp_dir = TempDir::new().unwrap();
    let source = StaticSource::ok(b"x");
    let (retriever, _store) = retriever(
        source.clone(),
        Arc::new(FileSystemSink::new(temp_dir.path())),
    );
    let link = link("text/plain");

    retriever
        .retrieve_for_preview(&link, &AccessCredential::password("s3cret"))
        .await
        .unwrap();
    retriever
        .retrieve_for_preview(&link, &AccessCredential::password(""))
        .await
        .unwrap();

    let seen = source.passwords.lock().unwrap().clone();
    assert_eq!(seen, vec![Some("s3cret".to_string()), None]);
}

#[tokio::test]
async fn test_late_response_of_older_request_is_discarded() {
    let temp_dir = TempDir::new().unwrap();
    let (source, mut replies, mut started) = scripted(2);
    let (retriever, store) = retriever(source, Arc::new(FileSystemSink::new(temp_dir.path())));
    let link = link("image/jpeg");

    let r = retriever.clone();
    let l = link.clone();
    let request_a = tokio::spawn(async move {
        r.retrieve_for_preview(&l, &AccessCredential::password("a"))
            .await
    });
    assert_eq!(started.recv().await, Some(Some("a".to_string())));

    let r = retriever.clone();
    let l = link.clone();
    let request_b = tokio::spawn(async move {
        r.retrieve_for_preview(&l, &AccessCredential::password("b"))
            .await
    });
    assert_eq!(started.recv().await, Some(Some("b".to_string())));

    let reply_b = replies.pop().unwrap();
    let reply_a = replies.pop().unwrap();

    reply_b.send(Ok(Bytes::from_static(b"B"))).unwrap();
    let b = installed(request_b.await.unwrap().unwrap());

    reply_a.send(Ok(Bytes::from_static(b"A"))).unwrap();
    assert_eq!(
        request_a.await.unwrap().unwrap(),
        PreviewRetrieval::Superseded
    );

    assert_eq!(retriever.current(), Some(b.clone()));
    assert_eq!(store.resolve(b.id).as_deref(), Some(&b"B"[..]));
    assert_eq!(store.live_count(), 1);
}

#[tokio::test]
async fn test_older_request_finishing_first_is_still_stale() {
    let temp_dir = TempDir::new().unwrap();
    let (source, mut replies, mut started) = scripted(2);
    let (retriever, store) = retriever(source, Arc::new(FileSystemSink::new(temp_dir.path())));
    let link = link("image/jpeg");

    let r = retriever.clone();
    let l = link.clone();
    let request_a =
        tokio::spawn(async move { r.retrieve_for_preview(&l, &AccessCredential::none()).await });
    started.recv().await.unwrap();

    let r = retriever.clone();
    let l = link.clone();
    let request_b =
        tokio::spawn(async move { r.retrieve_for_preview(&l, &AccessCredential::none()).await });
    started.recv().await.unwrap();

    let reply_b = replies.pop().unwrap();
    let reply_a = replies.pop().unwrap();

    reply_a.send(Ok(Bytes::from_static(b"A"))).unwrap();
    assert_eq!(
        request_a.await.unwrap().unwrap(),
        PreviewRetrieval::Superseded
    );
    assert_eq!(retriever.current(), None);

    reply_b.send(Ok(Bytes::from_static(b"B"))).unwrap();
    let b = installed(request_b.await.unwrap().unwrap());
    assert_eq!(store.resolve(b.id).as_deref(), Some(&b"B"[..]));
    assert_eq!(store.total_revocations(), 0);
}

#[tokio::test]
async fn test_stale_failure_is_discarded() {
    let temp_dir = TempDir::new().unwrap();
    let (source, mut replies, mut started) = scripted(2);
    let (retriever, _store) = retriever(source, Arc::new(FileSystemSink::new(temp_dir.path())));
    let link = link("video/mp4");

    let r = retriever.clone();
    let l = link.clone();
    let request_a = tokio::spawn(async move {
        r.retrieve_for_preview(&l, &AccessCredential::password("wrong"))
            .await
    });
    started.recv().await.unwrap();

    let r = retriever.clone();
    let l = link.clone();
    let request_b = tokio::spawn(async move {
        r.retrieve_for_preview(&l, &AccessCredential::password("right"))
            .await
    });
    started.recv().await.unwrap();

    let reply_b = replies.pop().unwrap();
    let reply_a = replies.pop().unwrap();

    reply_a
        .send(Err(classify(403, Some("Incorrect password"))))
        .unwrap();
    assert_eq!(
        request_a.await.unwrap().unwrap(),
        PreviewRetrieval::Superseded
    );

    reply_b.send(Ok(Bytes::from_static(b"video"))).unwrap();
    installed(request_b.await.unwrap().unwrap());
}

#[tokio::test]
async fn test_current_failure_is_reported_and_keeps_previous_handle() {
    let temp_dir = TempDir::new().unwrap();
    let (source, mut replies, _started) = scripted(2);
    let (retriever, store) = retriever(source, Arc::new(FileSystemSink::new(temp_dir.path())));
    let link = link("text/plain");

    let reply_err = replies.pop().unwrap();
    let reply_ok = replies.pop().unwrap();

    reply_ok.send(Ok(Bytes::from_static(b"hello"))).unwrap();
    let first = installed(
        retriever
            .retrieve_for_preview(&link, &AccessCredential::none())
            .await
            .unwrap(),
    );

    reply_err.send(Err(classify(404, None))).unwrap();
    let err = retriever
        .retrieve_for_preview(&link, &AccessCredential::none())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(retriever.current(), Some(first));
    assert_eq!(store.total_revocations(), 0);
}

#[tokio::test]
async fn test_teardown_invalidates_in_flight_preview() {
    let temp_dir = TempDir::new().unwrap();
    let (source, mut replies, mut started) = scripted(1);
    let (retriever, store) = retriever(source, Arc::new(FileSystemSink::new(temp_dir.path())));
    let link = link("audio/mpeg");

    let r = retriever.clone();
    let l = link.clone();
    let request =
        tokio::spawn(async move { r.retrieve_for_preview(&l, &AccessCredential::none()).await });
    started.recv().await.unwrap();

    retriever.teardown();
    replies
        .pop()
        .unwrap()
        .send(Ok(Bytes::from_static(b"late")))
        .unwrap();

    assert_eq!(request.await.unwrap().unwrap(), PreviewRetrieval::Superseded);
    assert_eq!(retriever.current(), None);
    assert_eq!(store.live_count(), 0);
}

#[tokio::test]
async fn test_download_saves_file_and_revokes_transient_handle() {
    let temp_dir = TempDir::new().unwrap();
    let (retriever, store) = retriever(
        StaticSource::ok(b"%PDF-1.7"),
        Arc::new(FileSystemSink::new(temp_dir.path())),
    );

    let path = retriever
        .retrieve_for_download(
            &link("application/pdf"),
            "report.pdf",
            &AccessCredential::none(),
        )
        .await
        .unwrap();

    assert_eq!(path, temp_dir.path().join("report.pdf"));
    assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7");
    assert_eq!(retriever.current(), None, "downloads are never cached");
    assert_eq!(store.live_count(), 0);
    assert_eq!(store.total_revocations(), 1);
}

#[tokio::test]
async fn test_download_does_not_overwrite_existing_files() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("report.pdf"), "older").unwrap();
    let (retriever, _store) = retriever(
        StaticSource::ok(b"newer"),
        Arc::new(FileSystemSink::new(temp_dir.path())),
    );

    let path = retriever
        .retrieve_for_download(
            &link("application/pdf"),
            "report.pdf",
            &AccessCredential::none(),
        )
        .await
        .unwrap();

    assert_eq!(path, temp_dir.path().join("report (1).pdf"));
    assert_eq!(
        std::fs::read_to_string(temp_dir.path().join("report.pdf")).unwrap(),
        "older"
    );
}

#[tokio::test]
async fn test_download_sanitises_server_file_name() {
    let temp_dir = TempDir::new().unwrap();
    let downloads = temp_dir.path().join("nested").join("downloads");
    let (retriever, _store) = retriever(
        StaticSource::ok(b"data"),
        Arc::new(FileSystemSink::new(&downloads)),
    );

    let path = retriever
        .retrieve_for_download(&link("text/plain"), "../escape.txt", &AccessCredential::none())
        .await
        .unwrap();

    assert_eq!(path.parent(), Some(downloads.as_path()));
    assert!(path.exists());
}

#[tokio::test]
async fn test_sink_failure_is_unknown_and_still_revokes() {
    let (retriever, store) = retriever(StaticSource::ok(b"data"), Arc::new(BrokenSink));

    let err = retriever
        .retrieve_for_download(&link("text/plain"), "a.txt", &AccessCredential::none())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unknown);
    assert!(err.detail().unwrap().contains("disk full"));
    assert_eq!(store.live_count(), 0);
    assert_eq!(store.total_revocations(), 1);
}

#[tokio::test]
async fn test_download_fetch_failure_creates_no_handle() {
    let temp_dir = TempDir::new().unwrap();
    let (retriever, store) = retriever(
        StaticSource::failing(classify(410, None)),
        Arc::new(FileSystemSink::new(temp_dir.path())),
    );

    let err = retriever
        .retrieve_for_download(&link("text/plain"), "a.txt", &AccessCredential::none())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Expired);
    assert_eq!(store.total_revocations(), 0);
}
