/*
 * Site content indexing and full text search
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

mod common;

use std::fs;
use std::sync::Arc;

use sitesearch::index::count_documents;
use sitesearch::{
    RunError, RunRegistry, RunState, SearchQuery, SearchResultPage,
    SearchService, ModuleConfig,
};

use common::*;

fn search(module: &ModuleConfig, text: &str) -> SearchResultPage {
    SearchService::new(module.index_config())
        .search(&SearchQuery::new(text))
        .expect("search failed")
}

fn urls_of(page: &SearchResultPage) -> Vec<String> {
    page.items.iter().map(|hit| hit.url.clone()).collect()
}

#[test]
fn reindexing_keeps_one_document_per_url() {
    let (_dir, module) = temp_module();
    let registry = RunRegistry::new();
    let url_a = "http://www.example.com/a.html";

    /*
     * 初回の登録
     */
    let fetcher = StubFetcher::new()
        .html(url_a, &html_page("A", "first", "original kiwifruit text"))
        .html(
            "http://www.example.com/b.html",
            &html_page("B", "second", "other pineapple text"),
        );
    let status = run_to_end(
        &registry, &module, Arc::new(fetcher), &["/a.html", "/b.html"],
    );
    assert_eq!(status.state, RunState::Done { cancelled: false });
    assert_eq!(status.urls_processed, 2);

    /*
     * 同じURLの再登録
     */
    for _ in 0..2 {
        let fetcher = StubFetcher::new()
            .html(url_a, &html_page("A", "first", "revised mango text"));
        let status = run_to_end(&registry, &module, Arc::new(fetcher), &["a.html"]);
        assert!(!status.is_failed());
    }

    let config = module.index_config();
    assert_eq!(count_documents(&config, url_a).expect("count"), 1);
    assert_eq!(
        count_documents(&config, "http://www.example.com/b.html").expect("count"),
        1
    );

    assert_eq!(urls_of(&search(&module, "mango")), vec![url_a]);
    assert_eq!(search(&module, "kiwifruit").total_matches, 0);
    assert_eq!(search(&module, "pineapple").total_matches, 1);
}

#[test]
fn html_markup_is_not_searchable() {
    let (_dir, module) = temp_module();
    let registry = RunRegistry::new();
    let html = concat!(
        "<html><head><title>Startseite</title>",
        "<style>.walrus { color: red; }</style>",
        "<meta name=\"description\" content=\"Willkommen\">",
        "</head><body>",
        "<!-- octopus -->",
        "<script>var narwhal = 1;</script>",
        "<p>Der <b>Pinguin</b> schwimmt</p>",
        "</body></html>",
    );
    let fetcher = StubFetcher::new().html("http://www.example.com/index.html", html);

    let status = run_to_end(&registry, &module, Arc::new(fetcher), &["/index.html"]);
    assert!(!status.is_failed());

    let page = search(&module, "pinguin");
    assert_eq!(page.total_matches, 1);
    assert_eq!(page.items[0].title, "Startseite");
    assert_eq!(page.items[0].score_percent, 100);

    for word in ["walrus", "octopus", "narwhal", "script", "style"] {
        assert_eq!(search(&module, word).total_matches, 0, "{}", word);
    }
}

#[test]
fn pdf_documents_are_indexed() {
    let (_dir, module) = temp_module();
    let registry = RunRegistry::new();
    let pdf = concat!(
        "%PDF-1.4\n",
        "1 0 obj\n<< /Length 44 >>\nstream\n",
        "BT (Quarterly zebrafish report) Tj ET\n",
        "endstream\nendobj\n",
        "2 0 obj\n<< /Title (Annual Report) /Author (ACME) >>\nendobj\n",
        "%%EOF\n",
    );
    let fetcher = StubFetcher::new().raw(
        "http://www.example.com/docs/report.pdf",
        "application/pdf",
        pdf.as_bytes(),
    );

    let status = run_to_end(
        &registry, &module, Arc::new(fetcher), &["/docs/report.pdf"],
    );
    assert!(!status.is_failed());
    assert_eq!(status.urls_skipped, 0);

    let page = search(&module, "zebrafish");
    assert_eq!(urls_of(&page), vec!["http://www.example.com/docs/report.pdf"]);
    assert_eq!(page.items[0].title, "Annual Report");
    assert_eq!(page.items[0].size_bytes, pdf.len() as u64);
}

#[test]
fn pdfs_are_ignored_when_disabled() {
    let (_dir, mut module) = temp_module();
    module.index_pdfs = false;
    let registry = RunRegistry::new();
    let pdf = b"<< /Length 9 >>\nstream\n(aardvark)\nendstream";
    let fetcher = Arc::new(
        StubFetcher::new()
            .raw("http://www.example.com/doc.pdf", "application/pdf", pdf)
            .raw("http://www.example.com/get.html", "application/pdf", pdf),
    );

    let status = run_to_end(
        &registry, &module, fetcher.clone(), &["/doc.pdf", "/get.html"],
    );

    /*
     * 拡張子で除外されたURLは取得しない
     */
    assert_eq!(status.state, RunState::Done { cancelled: false });
    assert_eq!(status.urls_total, 1);
    assert_eq!(fetcher.requests(), vec!["http://www.example.com/get.html"]);

    /*
     * PDFとして返された文書も登録しない
     */
    assert_eq!(status.urls_skipped, 1);

    let config = module.index_config();
    for url in ["http://www.example.com/doc.pdf", "http://www.example.com/get.html"] {
        assert_eq!(count_documents(&config, url).expect("count"), 0, "{}", url);
    }
    assert_eq!(search(&module, "aardvark").total_matches, 0);
}

#[test]
fn missing_pages_are_skipped() {
    let (_dir, module) = temp_module();
    let registry = RunRegistry::new();
    let mut fetcher = StubFetcher::new()
        .html(
            "http://www.example.com/ok.html",
            &html_page("OK", "fine", "present giraffe"),
        )
        .raw("http://www.example.com/image.html", "image/png", b"\x89PNG");

    let markers = ["Not Found (404)", "HTTP Status 404", "Error 404"];
    let mut urls = vec!["/ok.html".to_string(), "/missing.html".to_string()];
    for (i, marker) in markers.iter().enumerate() {
        fetcher = fetcher.html(
            &format!("http://www.example.com/soft404-{}.html", i),
            &html_page("Oops", "gone", &format!("{} giraffe", marker)),
        );
        urls.push(format!("/soft404-{}.html", i));
    }
    urls.push("/image.html".to_string());

    let urls: Vec<&str> = urls.iter().map(String::as_str).collect();
    let status = run_to_end(&registry, &module, Arc::new(fetcher), &urls);

    assert!(!status.is_failed());
    assert!(!status.is_cancelled());
    assert_eq!(status.urls_total, 6);
    assert_eq!(status.urls_processed, 6);
    assert_eq!(status.urls_skipped, 5);

    assert_eq!(
        urls_of(&search(&module, "giraffe")),
        vec!["http://www.example.com/ok.html"]
    );
}

#[test]
fn corrupt_index_is_recreated_and_retried() {
    let (_dir, module) = temp_module();
    let registry = RunRegistry::new();
    let url = "http://www.example.com/a.html";

    fs::create_dir_all(&module.index_directory).expect("mkdir");
    fs::write(module.index_directory.join("meta.json"), b"{ broken")
        .expect("write failed");

    let fetcher = StubFetcher::new()
        .html(url, &html_page("A", "a", "recovered otter"));
    let status = run_to_end(&registry, &module, Arc::new(fetcher), &["/a.html"]);

    assert_eq!(status.state, RunState::Done { cancelled: false });
    assert_eq!(status.urls_processed, 1);
    assert_eq!(status.urls_skipped, 0);
    assert_eq!(count_documents(&module.index_config(), url).expect("count"), 1);
    assert_eq!(urls_of(&search(&module, "otter")), vec![url]);
}

#[test]
fn failed_retry_marks_run_failed() {
    let (_dir, module) = temp_module();
    let registry = RunRegistry::new();
    let index_path = module.index_directory.clone();

    /*
     * 書き込み中にインデックスのディレクトリを通常のファイルに置き換え、
     * 書き込みと再作成の双方を失敗させる
     */
    let fetcher = StubFetcher::new()
        .html(
            "http://www.example.com/a.html",
            &html_page("A", "a", "doomed badger"),
        )
        .with_hook(move |_| {
            if index_path.is_dir() {
                fs::remove_dir_all(&index_path).expect("remove index");
                fs::write(&index_path, b"not a directory").expect("write failed");
            }
        });

    let status = run_to_end(&registry, &module, Arc::new(fetcher), &["/a.html"]);

    match &status.state {
        RunState::Failed { error } => assert!(!error.is_empty()),
        other => panic!("unexpected state: {:?}", other),
    }
    assert!(!registry.is_running(&module.index_directory));
}

#[test]
fn second_run_on_same_index_is_rejected() {
    let (_dir, module) = temp_module();
    let registry = RunRegistry::new();
    let gate = Arc::new(Gate::default());
    let fetcher = StubFetcher::new()
        .with_gate(gate.clone())
        .html(
            "http://www.example.com/a.html",
            &html_page("A", "a", "blocked hedgehog"),
        );

    let handle = start(&registry, &module, Arc::new(fetcher), &["/a.html"]);
    gate.wait_arrival();

    /*
     * 実行中の開始要求と全削除は拒否される
     */
    let result = registry.start(
        &module, Arc::new(StubFetcher::new()), &site(), &["/b.html"],
    );
    match result {
        Err(RunError::RunConflict { run_id, .. }) => assert_eq!(run_id, handle.id()),
        other => panic!("unexpected result: {:?}", other.map(|handle| handle.id())),
    }

    assert!(matches!(
        registry.delete_all(&module.index_config()),
        Err(RunError::RunConflict { .. })
    ));
    assert!(registry.is_running(&module.index_directory));

    /*
     * 終了後は再び開始できる
     */
    gate.open();
    let status = handle.wait();
    assert_eq!(status.state, RunState::Done { cancelled: false });

    assert!(!registry.is_running(&module.index_directory));
    assert_eq!(registry.status(&module.index_directory).state, status.state);
    assert_eq!(registry.status(&module.index_directory).state, RunState::Idle);

    let status = run_to_end(&registry, &module, Arc::new(StubFetcher::new()), &["/b.html"]);
    assert!(!status.is_failed());
    assert_eq!(search(&module, "hedgehog").total_matches, 1);
}

#[test]
fn cancelled_run_is_recovered_by_delete_all() {
    let (_dir, module) = temp_module();
    let registry = RunRegistry::new();
    let pages = [
        ("http://www.example.com/1.html", "first squirrel"),
        ("http://www.example.com/2.html", "second squirrel"),
        ("http://www.example.com/3.html", "third squirrel"),
    ];

    /*
     * 処理中の中断
     */
    let gate = Arc::new(Gate::default());
    let mut fetcher = StubFetcher::new().with_gate(gate.clone());
    for (url, body) in pages {
        fetcher = fetcher.html(url, &html_page("S", "s", body));
    }

    let handle = start(
        &registry, &module, Arc::new(fetcher), &["/1.html", "/2.html", "/3.html"],
    );
    gate.wait_arrival();

    assert!(registry.cancel(&module.index_directory));
    assert_eq!(handle.status().state, RunState::Cancelling);
    gate.open();

    let status = handle.wait();
    assert!(status.is_cancelled());
    assert!(status.urls_processed < 3);

    /*
     * 全削除してからの再実行
     */
    registry.delete_all(&module.index_config()).expect("delete_all failed");
    assert_eq!(search(&module, "squirrel").total_matches, 0);

    let mut fetcher = StubFetcher::new();
    for (url, body) in pages {
        fetcher = fetcher.html(url, &html_page("S", "s", body));
    }
    let status = run_to_end(
        &registry, &module, Arc::new(fetcher), &["/1.html", "/2.html", "/3.html"],
    );

    assert_eq!(status.state, RunState::Done { cancelled: false });
    assert_eq!(search(&module, "squirrel").total_matches, 3);
}

#[test]
fn inactive_module_does_not_start() {
    let (_dir, mut module) = temp_module();
    module.active = false;

    let result = RunRegistry::new().start(
        &module, Arc::new(StubFetcher::new()), &site(), &["/a.html"],
    );
    assert!(matches!(result, Err(RunError::Inactive)));
}
