#![allow(dead_code)]
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Cursor, Read};
use std::sync::{Mutex, MutexGuard, PoisonError};

use reqwest::Url;

use crate::transport::{Transport, Upload};

// In-memory pair of stores addressed by host: `source.test` is the source,
// any other host is the destination. Failures are injected per file name.
#[derive(Default)]
struct State {
    source: Vec<(String, Vec<u8>)>,
    dest: BTreeMap<String, Vec<u8>>,
    raw_list: Option<Vec<u8>>,
    list_fails: bool,
    list_attempts: usize,
    fail_get: HashSet<String>,
    panic_get: HashSet<String>,
    fail_post: HashMap<String, usize>,
    fail_delete: HashSet<String>,
    attempts: HashMap<(String, String), usize>,
    fetch_order: Vec<String>,
}

enum Reply {
    Body(Vec<u8>),
    Fail,
    Panic,
}

#[derive(Default)]
pub struct MockTransport {
    state: Mutex<State>,
}

fn split_url(url: &str) -> (bool, Option<String>) {
    let Ok(u) = Url::parse(url) else {
        return (false, None);
    };
    let is_source = u.host_str() == Some("source.test");
    let segs: Vec<String> = u.path_segments().map(|s| s.map(String::from).collect()).unwrap_or_default();
    let name = segs
        .iter()
        .position(|s| s == "files")
        .and_then(|i| segs.get(i + 1))
        .cloned();
    (is_source, name)
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn count(st: &mut State, method: &str, name: &str) {
        *st.attempts.entry((method.to_string(), name.to_string())).or_default() += 1;
    }

    pub fn put_source(&self, name: &str, data: &[u8]) {
        self.state().source.push((name.to_string(), data.to_vec()));
    }

    pub fn fail_list(&self) {
        self.state().list_fails = true;
    }

    pub fn set_raw_list(&self, raw: &[u8]) {
        self.state().raw_list = Some(raw.to_vec());
    }

    pub fn fail_get(&self, name: &str) {
        self.state().fail_get.insert(name.to_string());
    }

    pub fn panic_on_get(&self, name: &str) {
        self.state().panic_get.insert(name.to_string());
    }

    pub fn fail_post(&self, name: &str) {
        self.fail_post_times(name, usize::MAX);
    }

    pub fn fail_post_times(&self, name: &str, times: usize) {
        self.state().fail_post.insert(name.to_string(), times);
    }

    pub fn fail_delete(&self, name: &str) {
        self.state().fail_delete.insert(name.to_string());
    }

    pub fn source_names(&self) -> Vec<String> {
        self.state().source.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn dest_content(&self, name: &str) -> Option<Vec<u8>> {
        self.state().dest.get(name).cloned()
    }

    pub fn attempts(&self, method: &str, name: &str) -> usize {
        let key = (method.to_string(), name.to_string());
        self.state().attempts.get(&key).copied().unwrap_or(0)
    }

    pub fn list_attempts(&self) -> usize {
        self.state().list_attempts
    }

    pub fn fetch_order(&self) -> Vec<String> {
        self.state().fetch_order.clone()
    }
}

impl Transport for MockTransport {
    fn get<T, F>(&self, url: &str, max_attempts: usize, mut decode: F) -> Option<T>
    where
        F: FnMut(&mut dyn Read) -> anyhow::Result<T>,
    {
        let (is_source, name) = split_url(url);
        for _ in 0..max_attempts.max(1) {
            let reply = {
                let mut st = self.state();
                match &name {
                    None => {
                        st.list_attempts += 1;
                        if st.list_fails {
                            Reply::Fail
                        } else if let Some(raw) = &st.raw_list {
                            Reply::Body(raw.clone())
                        } else {
                            let names: Vec<&str> = st.source.iter().map(|(n, _)| n.as_str()).collect();
                            Reply::Body(serde_json::to_vec(&names).unwrap_or_default())
                        }
                    }
                    Some(n) => {
                        Self::count(&mut st, "GET", n);
                        st.fetch_order.push(n.clone());
                        let found = if is_source {
                            st.source.iter().find(|(k, _)| k == n).map(|(_, v)| v.clone())
                        } else {
                            st.dest.get(n).cloned()
                        };
                        if st.panic_get.contains(n) {
                            Reply::Panic
                        } else if st.fail_get.contains(n) {
                            Reply::Fail
                        } else {
                            found.map(Reply::Body).unwrap_or(Reply::Fail)
                        }
                    }
                }
            };
            match reply {
                Reply::Panic => panic!("simulated worker crash on {}", url),
                Reply::Fail => continue,
                Reply::Body(body) => {
                    if let Ok(v) = decode(&mut Cursor::new(body)) {
                        return Some(v);
                    }
                }
            }
        }
        None
    }

    fn post<P>(&self, _url: &str, max_attempts: usize, file_name: &str, mut provider: P) -> bool
    where
        P: FnMut() -> std::io::Result<Upload>,
    {
        for _ in 0..max_attempts.max(1) {
            Self::count(&mut self.state(), "POST", file_name);
            let mut content = match provider() {
                Ok(c) => c,
                Err(_) => continue,
            };
            let mut data = Vec::new();
            if content.read_to_end(&mut data).is_err() {
                continue;
            }
            let mut st = self.state();
            if let Some(remaining) = st.fail_post.get_mut(file_name)
                && *remaining > 0
            {
                *remaining -= 1;
                continue;
            }
            st.dest.insert(file_name.to_string(), data);
            return true;
        }
        false
    }

    fn delete(&self, url: &str, max_attempts: usize) -> bool {
        let (_, name) = split_url(url);
        let Some(name) = name else {
            return false;
        };
        for _ in 0..max_attempts.max(1) {
            let mut st = self.state();
            Self::count(&mut st, "DELETE", &name);
            if st.fail_delete.contains(&name) {
                continue;
            }
            if let Some(pos) = st.source.iter().position(|(k, _)| *k == name) {
                st.source.remove(pos);
                return true;
            }
        }
        false
    }
}
