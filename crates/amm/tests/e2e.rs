//! End-to-end tests for the AMM engine: registry, pairs, and router composed
//! over one shared token ledger.

use amm::{Address, Factory, Router, RouterError, TokenLedger, U256};

// Token addresses for testing
fn token_a() -> Address {
    Address::repeat_byte(0x01)
}

fn token_b() -> Address {
    Address::repeat_byte(0x02)
}

fn token_c() -> Address {
    Address::repeat_byte(0x03)
}

fn weth() -> Address {
    Address::repeat_byte(0xEE)
}

// Participant addresses
fn deployer() -> Address {
    Address::repeat_byte(0xA0)
}

fn alice() -> Address {
    Address::repeat_byte(0xAA)
}

fn bob() -> Address {
    Address::repeat_byte(0xBB)
}

fn treasury_wallet() -> Address {
    Address::repeat_byte(0x77)
}

fn router_address() -> Address {
    Address::repeat_byte(0xF1)
}

fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18))
}

fn wei(s: &str) -> U256 {
    s.parse().unwrap()
}

const NOW: u64 = 1_700_000_000;
const NEVER: u64 = u64::MAX;

/// Fresh ledger, registry, and router; alice holds plenty of every token and
/// native currency, with unlimited approvals to the router.
fn setup() -> (TokenLedger, Factory, Router) {
    let mut ledger = TokenLedger::new(weth());
    let mut factory = Factory::new(deployer());
    let router = Router::new(router_address(), weth());

    for token in [token_a(), token_b(), token_c()] {
        ledger.mint(token, alice(), ether(1_000_000)).unwrap();
        ledger.approve(token, alice(), router.address(), U256::MAX);
    }
    ledger.mint_native(alice(), ether(1_000_000)).unwrap();
    ledger.approve(weth(), alice(), router.address(), U256::MAX);

    // Route the treasury skim away from the participants.
    factory
        .update_treasury_wallet(deployer(), treasury_wallet())
        .unwrap();

    (ledger, factory, router)
}

/// Seed a pair with equal deposits from alice.
fn seed_pair(
    ledger: &mut TokenLedger,
    factory: &mut Factory,
    router: &Router,
    token_x: Address,
    token_y: Address,
    amount: U256,
) {
    router
        .add_liquidity(
            factory,
            ledger,
            alice(),
            token_x,
            token_y,
            amount,
            amount,
            U256::ZERO,
            U256::ZERO,
            alice(),
            NEVER,
            NOW,
        )
        .unwrap();
}

#[test]
fn add_liquidity_with_deflating_token() {
    let (mut ledger, mut factory, router) = setup();
    ledger.set_transfer_fee_bps(token_b(), 100); // 1% fee on transfer

    let (amount_a, amount_b, liquidity) = router
        .add_liquidity(
            &mut factory,
            &mut ledger,
            alice(),
            token_a(),
            token_b(),
            ether(1000),
            ether(1000),
            U256::ZERO,
            U256::ZERO,
            alice(),
            NEVER,
            NOW,
        )
        .unwrap();

    assert_eq!(amount_a, ether(1000));
    assert_eq!(amount_b, ether(1000)); // nominal; the pair received 990

    let pair_address = factory.get_pair(token_a(), token_b()).unwrap();
    assert_eq!(ledger.balance_of(token_a(), pair_address), ether(1000));
    assert_eq!(ledger.balance_of(token_b(), pair_address), ether(990));

    // Shares are minted off the measured 990, minus the locked minimum.
    assert_eq!(liquidity, wei("994987437106619953734"));
    let pair = factory.pair_at(pair_address).unwrap();
    assert_eq!(pair.balance_of(alice()), liquidity);
}

#[test]
fn add_liquidity_eth_wraps_only_what_is_used() {
    let (mut ledger, mut factory, router) = setup();
    let native_before = ledger.native_balance_of(alice());

    router
        .add_liquidity_eth(
            &mut factory,
            &mut ledger,
            alice(),
            token_a(),
            ether(1000),
            U256::ZERO,
            U256::ZERO,
            alice(),
            NEVER,
            NOW,
            ether(1000),
        )
        .unwrap();

    let pair_address = factory.get_pair(token_a(), weth()).unwrap();
    assert_eq!(ledger.balance_of(token_a(), pair_address), ether(1000));
    assert_eq!(ledger.balance_of(weth(), pair_address), ether(1000));
    assert_eq!(ledger.native_balance_of(alice()), native_before - ether(1000));
}

#[test]
fn remove_liquidity_with_deflating_token() {
    let (mut ledger, mut factory, router) = setup();
    ledger.set_transfer_fee_bps(token_b(), 100);
    seed_pair(&mut ledger, &mut factory, &router, token_a(), token_b(), ether(1000));

    let pair_address = factory.get_pair(token_a(), token_b()).unwrap();
    factory
        .pair_mut(token_a(), token_b())
        .unwrap()
        .approve(alice(), router.address(), U256::MAX);

    router
        .remove_liquidity(
            &mut factory,
            &mut ledger,
            alice(),
            token_a(),
            token_b(),
            ether(1),
            U256::ZERO,
            U256::ZERO,
            alice(),
            NEVER,
            NOW,
        )
        .unwrap();

    // Pro-rata of the measured balances (1000, 990) against the total
    // supply sqrt(1000e18 * 990e18).
    assert_eq!(
        ledger.balance_of(token_a(), pair_address),
        wei("998994962184740787925")
    );
    assert_eq!(
        ledger.balance_of(token_b(), pair_address),
        wei("989005012562893380046")
    );
}

#[test]
fn remove_liquidity_eth_round_trip() {
    let (mut ledger, mut factory, router) = setup();

    router
        .add_liquidity_eth(
            &mut factory,
            &mut ledger,
            alice(),
            token_a(),
            ether(1000),
            U256::ZERO,
            U256::ZERO,
            alice(),
            NEVER,
            NOW,
            ether(1000),
        )
        .unwrap();

    let pair_address = factory.get_pair(token_a(), weth()).unwrap();
    factory
        .pair_mut(token_a(), weth())
        .unwrap()
        .approve(alice(), router.address(), U256::MAX);

    let native_before = ledger.native_balance_of(bob());
    router
        .remove_liquidity_eth(
            &mut factory,
            &mut ledger,
            alice(),
            token_a(),
            ether(1),
            U256::ZERO,
            U256::ZERO,
            bob(),
            NEVER,
            NOW,
        )
        .unwrap();

    // Equal deposit: total supply is exactly 1000e18, so one share of 1e18
    // redeems 1e18 of each side.
    assert_eq!(ledger.balance_of(token_a(), pair_address), ether(999));
    assert_eq!(ledger.balance_of(weth(), pair_address), ether(999));
    assert_eq!(ledger.balance_of(token_a(), bob()), ether(1));
    assert_eq!(ledger.native_balance_of(bob()), native_before + ether(1));
}

#[test]
fn remove_liquidity_returns_no_more_than_deposited() {
    let (mut ledger, mut factory, router) = setup();
    seed_pair(&mut ledger, &mut factory, &router, token_a(), token_b(), ether(1000));

    let liquidity = factory
        .pair(token_a(), token_b())
        .unwrap()
        .balance_of(alice());
    factory
        .pair_mut(token_a(), token_b())
        .unwrap()
        .approve(alice(), router.address(), U256::MAX);

    let (amount_a, amount_b) = router
        .remove_liquidity(
            &mut factory,
            &mut ledger,
            alice(),
            token_a(),
            token_b(),
            liquidity,
            U256::ZERO,
            U256::ZERO,
            alice(),
            NEVER,
            NOW,
        )
        .unwrap();

    // The locked minimum stays in the pair forever.
    assert!(amount_a < ether(1000));
    assert!(amount_b < ether(1000));
    let pair = factory.pair(token_a(), token_b()).unwrap();
    assert_eq!(pair.total_supply(), U256::from(1000));
}

#[test]
fn quotes_reflect_measured_pool_balances() {
    let (mut ledger, mut factory, router) = setup();
    ledger.set_transfer_fee_bps(token_b(), 100);
    seed_pair(&mut ledger, &mut factory, &router, token_a(), token_b(), ether(1000));

    // Reserves are (1000, 990) after the deflating deposit.
    let path = [token_a(), token_b()];
    let out = Router::get_amounts_out(&factory, ether(1000), &path).unwrap();
    assert_eq!(out, vec![ether(1000), ether(495)]);

    let input = Router::get_amounts_in(&factory, ether(100), &path).unwrap();
    assert_eq!(input, vec![wei("112359550561797752809"), ether(100)]);
}

#[test]
fn swap_exact_tokens_for_tokens_skims_measured_output() {
    let (mut ledger, mut factory, router) = setup();
    ledger.set_transfer_fee_bps(token_b(), 100);
    seed_pair(&mut ledger, &mut factory, &router, token_a(), token_b(), ether(1000));

    let amounts = router
        .swap_exact_tokens_for_tokens(
            &mut factory,
            &mut ledger,
            alice(),
            ether(100),
            U256::ZERO,
            &[token_a(), token_b()],
            bob(),
            NEVER,
            NOW,
        )
        .unwrap();
    assert_eq!(amounts, vec![ether(100), ether(90)]);

    // The pair sees the full input and pays the quoted output.
    let pair_address = factory.get_pair(token_a(), token_b()).unwrap();
    assert_eq!(ledger.balance_of(token_a(), pair_address), ether(1100));
    assert_eq!(ledger.balance_of(token_b(), pair_address), ether(900));

    // The router received 89.1 (90 deflated by 1%), skimmed 2% of that to
    // the treasury, and forwarded the rest; both onward transfers deflate
    // again.
    assert_eq!(
        ledger.balance_of(token_b(), treasury_wallet()),
        wei("1764180000000000000")
    );
    assert_eq!(
        ledger.balance_of(token_b(), bob()),
        wei("86444820000000000000")
    );
    assert_eq!(ledger.balance_of(token_b(), router.address()), U256::ZERO);
}

#[test]
fn swap_tokens_for_exact_tokens_skims_required_input() {
    let (mut ledger, mut factory, router) = setup();
    ledger.set_transfer_fee_bps(token_b(), 100);
    seed_pair(&mut ledger, &mut factory, &router, token_a(), token_b(), ether(1000));

    let amounts = router
        .swap_tokens_for_exact_tokens(
            &mut factory,
            &mut ledger,
            alice(),
            ether(100),
            ether(1000),
            &[token_a(), token_b()],
            bob(),
            NEVER,
            NOW,
        )
        .unwrap();
    assert_eq!(amounts[0], wei("112359550561797752809"));

    // 2% of the required input goes to the treasury, 98% to the pair.
    let fee = wei("2247191011235955056");
    let net_in = amounts[0] - fee;
    assert_eq!(ledger.balance_of(token_a(), treasury_wallet()), fee);
    let pair_address = factory.get_pair(token_a(), token_b()).unwrap();
    assert_eq!(
        ledger.balance_of(token_a(), pair_address),
        wei("1110112359550561797753")
    );

    // The pair pays what the net input is worth, and that transfer deflates.
    let paid = Router::get_amount_out(net_in, ether(1000), ether(990)).unwrap();
    assert_eq!(ledger.balance_of(token_b(), pair_address), ether(990) - paid);
    assert_eq!(
        ledger.balance_of(token_b(), bob()),
        paid - paid * U256::from(100) / U256::from(10_000)
    );
}

#[test]
fn three_hop_exact_out_skims_exactly_once() {
    let (mut ledger, mut factory, router) = setup();
    seed_pair(&mut ledger, &mut factory, &router, token_a(), token_b(), ether(1000));
    seed_pair(&mut ledger, &mut factory, &router, token_b(), token_c(), ether(10_000));

    let amounts = router
        .swap_tokens_for_exact_tokens(
            &mut factory,
            &mut ledger,
            alice(),
            ether(100),
            ether(1000),
            &[token_a(), token_b(), token_c()],
            bob(),
            NEVER,
            NOW,
        )
        .unwrap();

    // One skim, on the input token only.
    let fee = amounts[0] * U256::from(20) / U256::from(1000);
    assert_eq!(ledger.balance_of(token_a(), treasury_wallet()), fee);
    assert_eq!(ledger.balance_of(token_b(), treasury_wallet()), U256::ZERO);
    assert_eq!(ledger.balance_of(token_c(), treasury_wallet()), U256::ZERO);

    // Delivery follows the measured chain off the net input.
    let out_b = Router::get_amount_out(amounts[0] - fee, ether(1000), ether(1000)).unwrap();
    let out_c = Router::get_amount_out(out_b, ether(10_000), ether(10_000)).unwrap();
    assert_eq!(ledger.balance_of(token_c(), bob()), out_c);
}

#[test]
fn three_hop_exact_in_skims_exactly_once() {
    let (mut ledger, mut factory, router) = setup();
    seed_pair(&mut ledger, &mut factory, &router, token_a(), token_b(), ether(1000));
    seed_pair(&mut ledger, &mut factory, &router, token_b(), token_c(), ether(10_000));

    let amounts = router
        .swap_exact_tokens_for_tokens(
            &mut factory,
            &mut ledger,
            alice(),
            ether(100),
            U256::ZERO,
            &[token_a(), token_b(), token_c()],
            bob(),
            NEVER,
            NOW,
        )
        .unwrap();

    // One skim, on the output token only.
    let received = *amounts.last().unwrap();
    let fee = received * U256::from(20) / U256::from(1000);
    assert_eq!(ledger.balance_of(token_a(), treasury_wallet()), U256::ZERO);
    assert_eq!(ledger.balance_of(token_b(), treasury_wallet()), U256::ZERO);
    assert_eq!(ledger.balance_of(token_c(), treasury_wallet()), fee);
    assert_eq!(ledger.balance_of(token_c(), bob()), received - fee);
}

#[test]
fn swap_exact_eth_for_tokens() {
    let (mut ledger, mut factory, router) = setup();
    router
        .add_liquidity_eth(
            &mut factory,
            &mut ledger,
            alice(),
            token_a(),
            ether(1000),
            U256::ZERO,
            U256::ZERO,
            alice(),
            NEVER,
            NOW,
            ether(1000),
        )
        .unwrap();

    let native_before = ledger.native_balance_of(alice());
    router
        .swap_exact_eth_for_tokens(
            &mut factory,
            &mut ledger,
            alice(),
            U256::ZERO,
            &[weth(), token_a()],
            bob(),
            NEVER,
            NOW,
            ether(100),
        )
        .unwrap();

    assert_eq!(ledger.native_balance_of(alice()), native_before - ether(100));
    let pair_address = factory.get_pair(token_a(), weth()).unwrap();
    assert_eq!(ledger.balance_of(weth(), pair_address), ether(1100));

    // Output 100 * 1000 / 1100, skimmed 2% before delivery.
    let out = wei("90909090909090909090");
    let fee = wei("1818181818181818181");
    assert_eq!(ledger.balance_of(token_a(), treasury_wallet()), fee);
    assert_eq!(ledger.balance_of(token_a(), bob()), out - fee);
}

#[test]
fn swap_exact_tokens_for_eth() {
    let (mut ledger, mut factory, router) = setup();
    router
        .add_liquidity_eth(
            &mut factory,
            &mut ledger,
            alice(),
            token_a(),
            ether(1000),
            U256::ZERO,
            U256::ZERO,
            alice(),
            NEVER,
            NOW,
            ether(1000),
        )
        .unwrap();

    let native_before = ledger.native_balance_of(bob());
    router
        .swap_exact_tokens_for_eth(
            &mut factory,
            &mut ledger,
            alice(),
            ether(100),
            U256::ZERO,
            &[token_a(), weth()],
            bob(),
            NEVER,
            NOW,
        )
        .unwrap();

    // The skim stays wrapped at the treasury; bob gets native currency.
    let out = wei("90909090909090909090");
    let fee = wei("1818181818181818181");
    assert_eq!(ledger.balance_of(weth(), treasury_wallet()), fee);
    assert_eq!(ledger.native_balance_of(bob()), native_before + out - fee);
}

#[test]
fn swap_eth_for_exact_tokens_refunds_excess_value() {
    let (mut ledger, mut factory, router) = setup();
    router
        .add_liquidity_eth(
            &mut factory,
            &mut ledger,
            alice(),
            token_a(),
            ether(1000),
            U256::ZERO,
            U256::ZERO,
            alice(),
            NEVER,
            NOW,
            ether(1000),
        )
        .unwrap();

    let native_before = ledger.native_balance_of(alice());
    let amounts = router
        .swap_eth_for_exact_tokens(
            &mut factory,
            &mut ledger,
            alice(),
            ether(90),
            &[weth(), token_a()],
            bob(),
            NEVER,
            NOW,
            ether(200),
        )
        .unwrap();

    // Only the computed requirement is wrapped, not the attached ceiling.
    assert_eq!(amounts[0], wei("98901098901098901099"));
    assert_eq!(
        ledger.native_balance_of(alice()),
        native_before - amounts[0]
    );

    let fee = amounts[0] * U256::from(20) / U256::from(1000);
    assert_eq!(ledger.balance_of(weth(), treasury_wallet()), fee);
    let out = Router::get_amount_out(amounts[0] - fee, ether(1000), ether(1000)).unwrap();
    assert_eq!(ledger.balance_of(token_a(), bob()), out);
}

#[test]
fn swap_tokens_for_exact_eth() {
    let (mut ledger, mut factory, router) = setup();
    router
        .add_liquidity_eth(
            &mut factory,
            &mut ledger,
            alice(),
            token_a(),
            ether(1000),
            U256::ZERO,
            U256::ZERO,
            alice(),
            NEVER,
            NOW,
            ether(1000),
        )
        .unwrap();

    let native_before = ledger.native_balance_of(bob());
    let amounts = router
        .swap_tokens_for_exact_eth(
            &mut factory,
            &mut ledger,
            alice(),
            ether(90),
            ether(1000),
            &[token_a(), weth()],
            bob(),
            NEVER,
            NOW,
        )
        .unwrap();

    let fee = amounts[0] * U256::from(20) / U256::from(1000);
    assert_eq!(ledger.balance_of(token_a(), treasury_wallet()), fee);
    let out = Router::get_amount_out(amounts[0] - fee, ether(1000), ether(1000)).unwrap();
    assert_eq!(ledger.native_balance_of(bob()), native_before + out);
}

#[test]
fn expired_deadline_rejected() {
    let (mut ledger, mut factory, router) = setup();

    let result = router.add_liquidity(
        &mut factory,
        &mut ledger,
        alice(),
        token_a(),
        token_b(),
        ether(1000),
        ether(1000),
        U256::ZERO,
        U256::ZERO,
        alice(),
        NOW - 1,
        NOW,
    );
    assert_eq!(result, Err(RouterError::Expired));

    let result = router.swap_exact_tokens_for_tokens(
        &mut factory,
        &mut ledger,
        alice(),
        ether(1),
        U256::ZERO,
        &[token_a(), token_b()],
        alice(),
        NOW - 1,
        NOW,
    );
    assert_eq!(result, Err(RouterError::Expired));
}

#[test]
fn slippage_failures_roll_back_all_transfers() {
    let (mut ledger, mut factory, router) = setup();
    seed_pair(&mut ledger, &mut factory, &router, token_a(), token_b(), ether(1000));
    let pair_address = factory.get_pair(token_a(), token_b()).unwrap();
    let alice_a = ledger.balance_of(token_a(), alice());

    // Quoted output for 100 in is 90.909..., below the demanded minimum.
    let result = router.swap_exact_tokens_for_tokens(
        &mut factory,
        &mut ledger,
        alice(),
        ether(100),
        ether(91),
        &[token_a(), token_b()],
        bob(),
        NEVER,
        NOW,
    );
    assert_eq!(result, Err(RouterError::InsufficientOutputAmount));

    // Required input for 90 out is 98.9..., above the offered maximum.
    let result = router.swap_tokens_for_exact_tokens(
        &mut factory,
        &mut ledger,
        alice(),
        ether(90),
        ether(98),
        &[token_a(), token_b()],
        bob(),
        NEVER,
        NOW,
    );
    assert_eq!(result, Err(RouterError::ExcessiveInputAmount));

    // Nothing moved.
    assert_eq!(ledger.balance_of(token_a(), alice()), alice_a);
    assert_eq!(ledger.balance_of(token_a(), pair_address), ether(1000));
    assert_eq!(ledger.balance_of(token_b(), pair_address), ether(1000));
    assert_eq!(ledger.balance_of(token_a(), treasury_wallet()), U256::ZERO);
    assert_eq!(ledger.balance_of(token_b(), bob()), U256::ZERO);
}

#[test]
fn swap_preserves_constant_product() {
    let (mut ledger, mut factory, router) = setup();
    seed_pair(&mut ledger, &mut factory, &router, token_a(), token_b(), ether(1000));

    let (r0, r1, _) = factory.pair(token_a(), token_b()).unwrap().get_reserves();
    let k_before = r0 * r1;

    router
        .swap_exact_tokens_for_tokens(
            &mut factory,
            &mut ledger,
            alice(),
            ether(37),
            U256::ZERO,
            &[token_a(), token_b()],
            bob(),
            NEVER,
            NOW,
        )
        .unwrap();

    let (r0, r1, _) = factory.pair(token_a(), token_b()).unwrap().get_reserves();
    assert!(r0 * r1 >= k_before);
}
