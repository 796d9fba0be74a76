use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use polinpin::auth::{AuthService, PlaintextHasher, SessionManager};
use polinpin::config::DuplicateUsers;
use polinpin::models::*;
use polinpin::store::{StudyStore, UserDirectory};
use polinpin::studies::StudyService;

fn auth_service() -> AuthService {
    AuthService::new(
        UserDirectory::new(),
        SessionManager::new(),
        Arc::new(PlaintextHasher),
        DuplicateUsers::Overwrite,
    )
}

fn study(n: usize) -> Study {
    Study {
        name: format!("Study {n}"),
        tasks: vec![Task::new(format!("Find node {n}."), format!("n{n}"))],
        tree: Node::new("root", "Root").with_children(vec![Node::new(format!("n{n}"), "Leaf")]),
    }
}

#[test]
fn concurrent_puts_on_distinct_keys_are_all_kept() {
    const WRITERS: usize = 64;
    let service = StudyService::new(StudyStore::new());

    thread::scope(|s| {
        for n in 0..WRITERS {
            let service = service.clone();
            s.spawn(move || {
                service
                    .put_study(&format!("study-{n}"), study(n))
                    .expect("put");
            });
        }
    });

    assert_eq!(service.store().len(), WRITERS);
    for n in 0..WRITERS {
        assert_eq!(service.get_study(&format!("study-{n}")).expect("study"), study(n));
    }
}

#[test]
fn concurrent_puts_on_one_key_leave_one_whole_study() {
    const WRITERS: usize = 32;
    let store = StudyStore::new();

    thread::scope(|s| {
        for n in 0..WRITERS {
            let store = store.clone();
            s.spawn(move || store.put("contested", study(n)));
        }
        for _ in 0..WRITERS {
            let store = store.clone();
            s.spawn(move || {
                // Whatever a reader sees must be one of the written studies in full.
                if let Ok(seen) = store.get("contested") {
                    assert!((0..WRITERS).any(|n| seen == study(n)));
                }
            });
        }
    });

    let last = store.get("contested").expect("study");
    assert!((0..WRITERS).any(|n| last == study(n)));
}

#[test]
fn concurrent_logins_leave_exactly_one_valid_token() {
    const LOGINS: usize = 32;
    let auth = auth_service();
    auth.register(RegisterInput {
        name: "A".to_string(),
        username: "a".to_string(),
        password: "p".to_string(),
    })
    .expect("register");

    let tokens: Vec<String> = thread::scope(|s| {
        let handles: Vec<_> = (0..LOGINS)
            .map(|_| {
                let auth = auth.clone();
                s.spawn(move || {
                    auth.login(LoginInput {
                        username: "a".to_string(),
                        password: "p".to_string(),
                    })
                    .expect("login")
                    .token
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("login thread"))
            .collect()
    });

    let distinct: HashSet<&String> = tokens.iter().collect();
    assert_eq!(distinct.len(), LOGINS);

    let valid: Vec<&String> = tokens
        .iter()
        .filter(|token| auth.sessions().validate("a", token))
        .collect();
    assert_eq!(valid.len(), 1);
}

#[test]
fn concurrent_registrations_of_distinct_users_all_succeed() {
    const USERS: usize = 32;
    let auth = auth_service();

    let sessions: Vec<(String, UserSession)> = thread::scope(|s| {
        let handles: Vec<_> = (0..USERS)
            .map(|n| {
                let auth = auth.clone();
                s.spawn(move || {
                    let username = format!("user{n}");
                    let session = auth
                        .register(RegisterInput {
                            name: format!("User {n}"),
                            username: username.clone(),
                            password: "p".to_string(),
                        })
                        .expect("register");
                    (username, session)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("register thread"))
            .collect()
    });

    assert_eq!(auth.users().len(), USERS);
    for (username, session) in &sessions {
        assert!(auth.sessions().validate(username, &session.token));
    }
}

#[test]
fn logout_with_an_old_token_never_drops_a_racing_login() {
    const ROUNDS: usize = 2_000;
    let auth = auth_service();
    let mut current = auth
        .register(RegisterInput {
            name: "A".to_string(),
            username: "a".to_string(),
            password: "p".to_string(),
        })
        .expect("register")
        .token;

    for _ in 0..ROUNDS {
        let old = current.clone();
        let fresh = thread::scope(|s| {
            let logout = {
                let auth = auth.clone();
                s.spawn(move || auth.logout("a", &old))
            };
            let login = {
                let auth = auth.clone();
                s.spawn(move || {
                    auth.login(LoginInput {
                        username: "a".to_string(),
                        password: "p".to_string(),
                    })
                    .expect("login")
                    .token
                })
            };
            // The logout may win or lose the race; either outcome is fine.
            let _ = logout.join().expect("logout thread");
            login.join().expect("login thread")
        });

        assert!(auth.sessions().validate("a", &fresh));
        current = fresh;
    }
}
