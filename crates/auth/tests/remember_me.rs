//! Black-box remember-me lifecycle tests against the in-memory collaborators.

use std::sync::Arc;

use proptest::prelude::*;

use tollgate_auth::{
    Configuration, CookieJar, CookieSettings, GuardFactory, GuardStatus, MemoryCookieJar,
    MemoryUserStore, Principal, PrincipalStore, Session, User, UserRecord,
};
use tollgate_core::Entity;

fn seeded(users: &MemoryUserStore, token: &str) -> User {
    users
        .insert(UserRecord::new(format!("user-{token}@example.com")).with_remember_token(token))
        .unwrap()
}

fn delegating(name: &'static str) -> GuardFactory<User> {
    GuardFactory::from_fn(name, |session, next| next.call(session))
}

fn rejecting() -> GuardFactory<User> {
    GuardFactory::from_fn("reject", |_, _| Ok(GuardStatus::failure("nope").with_redirect("/sign_in")))
}

#[test]
fn remembered_user_signs_out_and_token_stops_resolving() {
    tollgate_observability::init();

    let users = MemoryUserStore::new();
    let u1 = seeded(&users, "abc123");
    let config = Configuration::new(Arc::new(users.clone())).shared();

    let mut jar = MemoryCookieJar::new().with_cookie("remember_token", "abc123");
    {
        let mut session = Session::new(config, &mut jar);
        assert_eq!(session.current_user().map(|u| *u.id()), Some(*u1.id()));
        session.sign_out();
        assert!(session.signed_out());
    }

    assert!(jar.get("remember_token").is_none());
    assert!(users.find_by_remember_token("abc123").unwrap().is_none());

    let reloaded = users.find(*u1.id()).unwrap().unwrap();
    assert_ne!(reloaded.remember_token(), Some("abc123"));
}

#[test]
fn next_request_is_signed_in_from_the_written_cookie() {
    let users = MemoryUserStore::new();
    let user = users.create("alice@example.com").unwrap();
    let config = Configuration::new(Arc::new(users)).shared();

    let mut response = MemoryCookieJar::new();
    Session::new(config.clone(), &mut response)
        .sign_in(user.clone())
        .unwrap();

    let token = response.get("remember_token").unwrap().to_string();
    let mut next_request = MemoryCookieJar::new().with_cookie("remember_token", token);
    let session = Session::new(config, &mut next_request);
    assert_eq!(session.current_user(), Some(user));
}

#[test]
fn empty_token_principal_is_approved_but_never_remembered() {
    let users = MemoryUserStore::new();
    let u2 = users
        .insert(UserRecord::new("u2@example.com").with_remember_token(""))
        .unwrap();
    let config = Configuration::new(Arc::new(users)).shared();

    let mut jar = MemoryCookieJar::new();
    {
        let mut session = Session::new(config, &mut jar);
        let status = session.sign_in(u2).unwrap();
        assert!(status.is_success());
        assert!(session.signed_out());
    }

    assert!(jar.writes().is_empty());
    assert!(jar.get("remember_token").is_none());
}

#[test]
fn domainless_configuration_never_sends_a_domain() {
    let users = MemoryUserStore::new();
    let user = seeded(&users, "tok");
    let config = Configuration::new(Arc::new(users))
        .with_cookie_settings(CookieSettings {
            cookie_domain: Some(String::new()),
            ..CookieSettings::default()
        })
        .unwrap()
        .shared();

    let mut jar = MemoryCookieJar::new();
    {
        let mut session = Session::new(config, &mut jar);
        session.sign_in(user).unwrap();
        session.sign_out();
    }

    assert!(jar.writes().iter().all(|(_, o)| o.domain.is_none()));
    assert!(jar.deletions().iter().all(|(_, o)| o.domain.is_none()));
}

#[test]
fn cookie_crate_jar_round_trip_through_a_session() {
    let users = MemoryUserStore::new();
    let user = seeded(&users, "tok-cookie");
    let config = Configuration::new(Arc::new(users))
        .with_cookie_settings(CookieSettings {
            cookie_domain: Some("example.com".to_string()),
            secure_cookie: true,
            ..CookieSettings::default()
        })
        .unwrap()
        .shared();

    let mut jar = cookie::CookieJar::new();
    {
        let mut session = Session::new(config.clone(), &mut jar);
        assert!(session.sign_in(user).unwrap().is_success());
    }

    let written = jar.get("remember_token").unwrap();
    assert_eq!(written.value(), "tok-cookie");
    assert_eq!(written.domain(), Some("example.com"));
    assert_eq!(written.secure(), Some(true));

    {
        let mut session = Session::new(config, &mut jar);
        assert!(session.signed_in());
        session.sign_out();
    }
    assert!(CookieJar::get(&jar, "remember_token").is_none());
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// Property: any chain of delegating guards behaves like no chain at all.
    #[test]
    fn delegating_chains_always_remember(
        token in "[a-f0-9]{8,40}",
        depth in 0usize..6,
    ) {
        let users = MemoryUserStore::new();
        let user = seeded(&users, &token);
        let config = Configuration::new(Arc::new(users.clone()))
            .with_sign_in_guards((0..depth).map(|_| delegating("delegate")))
            .shared();

        let mut jar = MemoryCookieJar::new();
        {
            let mut session = Session::new(config, &mut jar);
            let status = session.sign_in(user.clone()).unwrap();
            prop_assert!(status.is_success());
            prop_assert_eq!(session.current_user(), Some(user.clone()));
            session.sign_out();
        }

        prop_assert!(jar.get("remember_token").is_none());
        prop_assert_eq!(jar.writes().len(), 1);
        prop_assert!(users.find_by_remember_token(&token).unwrap().is_none());
    }

    /// Property: a rejecting outermost guard wins regardless of what follows.
    #[test]
    fn rejecting_first_guard_never_sets_cookie(
        token in "[a-f0-9]{0,40}",
        trailing in 0usize..4,
    ) {
        let users = MemoryUserStore::new();
        let user = seeded(&users, &token);
        let config = Configuration::new(Arc::new(users))
            .with_sign_in_guard(rejecting())
            .with_sign_in_guards((0..trailing).map(|_| delegating("delegate")))
            .shared();

        let mut jar = MemoryCookieJar::new();
        {
            let mut session = Session::new(config, &mut jar);
            let status = session.sign_in(user).unwrap();
            prop_assert!(status.is_failure());
            prop_assert_eq!(status.redirect(), Some("/sign_in"));
            prop_assert!(session.current_user().is_none());
        }

        prop_assert!(jar.writes().is_empty());
    }

    /// Property: with a domain configured, every delete is scoped to it.
    #[test]
    fn configured_domain_is_on_every_delete(
        domain in "[a-z]{1,12}\\.(com|org|io)",
        signed_in in any::<bool>(),
    ) {
        let users = MemoryUserStore::new();
        let user = seeded(&users, "tok");
        let config = Configuration::new(Arc::new(users))
            .with_cookie_settings(CookieSettings {
                cookie_domain: Some(domain.clone()),
                ..CookieSettings::default()
            })
            .unwrap()
            .shared();

        let mut jar = MemoryCookieJar::new();
        {
            let mut session = Session::new(config, &mut jar);
            if signed_in {
                session.sign_in(user).unwrap();
            }
            session.sign_out();
        }

        prop_assert_eq!(jar.deletions().len(), 1);
        prop_assert!(jar
            .deletions()
            .iter()
            .all(|(_, o)| o.domain.as_deref() == Some(domain.as_str())));
        prop_assert!(jar
            .writes()
            .iter()
            .all(|(_, o)| o.domain.as_deref() == Some(domain.as_str())));
    }
}
